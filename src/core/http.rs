use std::{
    fs::File,
    io::{
        BufWriter,
        Write,
    },
    path::Path,
    thread,
    time::Duration,
};

use reqwest::{
    blocking::{
        Client,
        Response,
    },
    header::{
        ACCEPT_ENCODING,
        USER_AGENT,
    },
};
use tracing::warn;

use crate::core::BookToCardsError;

const MAX_ATTEMPTS: u64 = 3;
const TIMEOUT: Duration = Duration::from_secs(120);
const AGENT: &str = concat!("booktocards/", env!("CARGO_PKG_VERSION"));

pub fn http_client() -> Result<Client, BookToCardsError> {
    Ok(Client::builder().timeout(TIMEOUT).user_agent(AGENT).build()?)
}

/// Turns a non-2xx answer into an error carrying status and url.
pub fn checked(response: Response) -> Result<Response, BookToCardsError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(BookToCardsError::Custom(format!("HTTP error {} from {}", status, response.url())))
    }
}

/// Runs `attempt` up to three times, waiting a little longer after each failure.
fn with_retries<T>(
    what: &str,
    mut attempt: impl FnMut() -> Result<T, BookToCardsError>,
) -> Result<T, BookToCardsError> {
    let mut n = 1;
    loop {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(e) if n < MAX_ATTEMPTS => {
                warn!("{} failed (attempt {}): {}", what, n, e);
                thread::sleep(Duration::from_secs(2 * n));
                n += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Streams `url` into `path`. An empty body counts as a failed attempt.
pub fn download_to_file(client: &Client, url: &str, path: &Path) -> Result<u64, BookToCardsError> {
    with_retries(&format!("GET {}", url), || {
        let mut response = checked(
            client.get(url).header(USER_AGENT, AGENT).header(ACCEPT_ENCODING, "identity").send()?,
        )?;
        let mut writer = BufWriter::new(File::create(path)?);
        let n_bytes = response.copy_to(&mut writer)?;
        writer.flush()?;
        if n_bytes == 0 {
            return Err(BookToCardsError::Custom(format!("Empty response body from {}", url)));
        }
        Ok(n_bytes)
    })
}
