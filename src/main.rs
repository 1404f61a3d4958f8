use std::path::PathBuf;

use anyhow::{
    bail,
    Context,
    Result,
};
use booktocards::{
    cards::CardBuilder,
    core::{
        ItemKind,
        KanjiRecord,
        TokenRecord,
    },
    dictionary::{
        frequency_manager::process_frequency_dictionaries,
        install::copy_dictionaries,
        jmdict::load_jmdict,
        sanseido::load_sanseido,
        token_dictionary::ensure_dictionary,
    },
    kb::INCR_DOC_NAME,
    parser::read_document,
    persistence::{
        delete_data_file,
        load_json,
        save_json,
        AppPaths,
    },
    scheduler::Placement,
    settings::SettingsData,
    slack::{
        extract_slack_export,
        SlackOptions,
        MSG_SEPARATOR,
    },
    tatoeba::TatoebaCorpus,
    translate::{
        DeeplTranslator,
        Translator,
    },
    BookToCardsError,
    DictType,
    KnowledgeBase,
    Scheduler,
    VibratoLemmatizer,
};
use chrono::{
    Local,
    NaiveDate,
};
use clap::{
    Parser,
    Subcommand,
    ValueEnum,
};
use tracing::{
    info,
    warn,
};
use tracing_subscriber::{
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

#[derive(Parser)]
#[command(name = "booktocards", about = "Japanese flashcards from your own reading", version)]
struct Cli {
    /// Root of the knowledge base, dictionaries and settings
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
    Token,
    Kanji,
}

impl From<Kind> for ItemKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Token => ItemKind::Token,
            Kind::Kanji => ItemKind::Kanji,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DictKind {
    Jmdict,
    Sanseido,
    Frequency,
}

#[derive(Subcommand)]
enum Command {
    /// Download the tokenizer model
    InitTokenizer,

    /// Copy Yomitan dictionary zips into the data directory
    InstallDict {
        #[arg(value_enum)]
        kind: DictKind,
        zips: Vec<PathBuf>,
    },

    /// Build the example sentence index from a Tatoeba .tsv in the tatoeba directory
    IndexTatoeba,

    /// Add a .txt or .srt document as a new source
    AddDoc {
        path: PathBuf,
        /// Source name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
        /// Extra sentence separator, e.g. the one written by `slack`
        #[arg(long)]
        sep: Option<String>,
    },

    /// Append text to the general source
    AddText { text: String },

    /// Add a single token, with an optional example sentence
    AddToken {
        token: String,
        #[arg(long)]
        sentence: Option<String>,
        #[arg(long, default_value = INCR_DOC_NAME)]
        source: String,
    },

    RemoveDoc { name: String },

    /// List sources
    Docs {
        /// Include sources made of single tokens
        #[arg(long)]
        all: bool,
    },

    Stats {
        name: String,
        #[arg(long)]
        min_count: Option<usize>,
    },

    /// Show what can still be studied
    Studiable {
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        kanji: bool,
        #[arg(long)]
        min_count: Option<usize>,
        /// Order by first appearance instead of count
        #[arg(long)]
        by_order: bool,
        #[arg(long)]
        limit: Option<usize>,
    },

    MarkKnown {
        #[arg(value_enum)]
        kind: Kind,
        values: Vec<String>,
    },

    Suspend {
        #[arg(value_enum)]
        kind: Kind,
        value: String,
        #[arg(long)]
        source: String,
    },

    /// Plan the next study round
    #[command(subcommand)]
    Session(SessionCommand),

    /// Extract Japanese messages from a Slack export
    Slack {
        export_dir: PathBuf,
        #[arg(long, default_value = "slack_extract.txt")]
        out: PathBuf,
        #[arg(long = "user")]
        users: Vec<String>,
        #[arg(long)]
        sample_prop: Option<f64>,
    },
}

#[derive(Subcommand)]
enum SessionCommand {
    Start {
        /// Defaults to the current date
        #[arg(long)]
        today: Option<NaiveDate>,
        #[arg(long)]
        n_days: Option<u32>,
        #[arg(long)]
        n_cards: Option<u32>,
        #[arg(long)]
        min_days: Option<u32>,
    },
    AddVocab {
        tokens: Vec<String>,
        #[arg(long)]
        source: String,
    },
    AddKanji {
        kanjis: Vec<String>,
        #[arg(long)]
        source: String,
    },
    /// Study an uncertain token after its kanji
    Later {
        token: String,
        #[arg(long)]
        source: String,
    },
    Known {
        #[arg(value_enum)]
        kind: Kind,
        value: String,
    },
    Suspend {
        #[arg(value_enum)]
        kind: Kind,
        value: String,
        #[arg(long)]
        source: String,
    },
    /// Kanji to decide on before uncertain vocabulary can be placed
    CheckKanji,
    Resolve,
    /// Drop the uncertain vocabulary
    Clear,
    Status,
    /// Write the cards and update the knowledge base
    Finish {
        /// Write csv files with headers instead of Anki imports
        #[arg(long)]
        plain: bool,
        #[arg(long)]
        no_translate: bool,
    },
}

fn parse_kanji(value: &str) -> Result<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(kanji), None) => Ok(kanji),
        _ => bail!("'{}' is not a single kanji", value),
    }
}

fn load_session(paths: &AppPaths) -> Result<Scheduler> {
    let session: Option<Scheduler> = load_json(&paths.session_file())?;
    session.context("No study session, run `booktocards session start` first")
}

fn save_session(paths: &AppPaths, scheduler: &Scheduler) -> Result<()> {
    save_json(scheduler, &paths.session_file())?;
    Ok(())
}

fn print_tokens(rows: &[&TokenRecord], limit: usize) {
    for row in rows.iter().take(limit) {
        println!("{}\t{}\t{}", row.token, row.count, row.source_name);
    }
    if rows.len() > limit {
        println!("... {} more", rows.len() - limit);
    }
}

fn print_kanjis(rows: &[&KanjiRecord], limit: usize) {
    for row in rows.iter().take(limit) {
        println!("{}\t{}\t{}", row.kanji, row.source_name, row.associated_toks_from_source.join(", "));
    }
    if rows.len() > limit {
        println!("... {} more", rows.len() - limit);
    }
}

fn run_session(command: SessionCommand, paths: &AppPaths, settings: &SettingsData) -> Result<()> {
    let mut kb = KnowledgeBase::open_existing(&paths.kb_dir())?;

    if let SessionCommand::Start { today, n_days, n_cards, min_days } = command {
        if paths.session_file().exists() {
            warn!("Replacing the unfinished session");
        }
        let scheduler = Scheduler::new(
            &kb,
            n_days.unwrap_or(settings.study.n_days_study),
            n_cards.unwrap_or(settings.study.n_cards_days),
            min_days.unwrap_or(settings.study.min_days_btwn_kanji_and_voc),
            today.unwrap_or_else(|| Local::now().date_naive()),
        )?;
        println!(
            "Session started: {}/{} items already due",
            scheduler.n_scheduled(),
            scheduler.capacity()
        );
        return save_session(paths, &scheduler);
    }

    let mut scheduler = load_session(paths)?;
    match command {
        SessionCommand::Start { .. } => {}
        SessionCommand::AddVocab { tokens, source } => {
            for (token, placement) in scheduler.add_vocabs_of_interest(&kb, &tokens, &source)? {
                match placement {
                    Placement::NextRound => println!("{}: next round", token),
                    Placement::Uncertain => println!("{}: waiting for a kanji check", token),
                }
            }
        }
        SessionCommand::AddKanji { kanjis, source } => {
            for kanji in &kanjis {
                match scheduler.add_kanji_for_next_round(&kb, parse_kanji(kanji)?, &source) {
                    Ok(()) => println!("{}: next round", kanji),
                    Err(BookToCardsError::EnoughItemsAdded { added, max }) => {
                        scheduler.empty_uncertain_vocab();
                        println!("Next round is full ({}/{}), uncertain vocabulary dropped", added, max);
                        break;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        SessionCommand::Later { token, source } => {
            let date = scheduler.add_vocab_for_rounds_after_next(&kb, &token, &source)?;
            println!("{}: studied from {}", token, date);
        }
        SessionCommand::Known { kind: Kind::Token, value } => scheduler.set_vocab_to_add_to_known(&value),
        SessionCommand::Known { kind: Kind::Kanji, value } => {
            scheduler.set_kanji_to_add_to_known(parse_kanji(&value)?)
        }
        SessionCommand::Suspend { kind: Kind::Token, value, source } => {
            scheduler.set_vocab_to_add_to_suspended(&value, &source)
        }
        SessionCommand::Suspend { kind: Kind::Kanji, value, source } => {
            scheduler.set_kanji_to_add_to_suspended(parse_kanji(&value)?, &source)
        }
        SessionCommand::CheckKanji => {
            let kanjis = scheduler.kanjis_to_check(&kb);
            if kanjis.is_empty() {
                println!("Nothing to check, run `booktocards session resolve`");
            }
            print_kanjis(&kanjis, usize::MAX);
        }
        SessionCommand::Resolve => {
            let resolution = scheduler.resolve_uncertain_vocab(&kb)?;
            println!("Next round: {}", resolution.next_round.join(", "));
            println!("Later rounds: {}", resolution.later_rounds.join(", "));
            if !resolution.dropped.is_empty() {
                println!("Dropped: {}", resolution.dropped.join(", "));
            }
        }
        SessionCommand::Clear => scheduler.empty_uncertain_vocab(),
        SessionCommand::Status => {
            println!("{}/{} items for the next round", scheduler.n_scheduled(), scheduler.capacity());
            for vocab in &scheduler.vocab_for_next_round {
                println!("vocab\t{}\t{}", vocab.token, vocab.source_name);
            }
            for kanji in &scheduler.kanji_for_next_round {
                println!("kanji\t{}\t{}", kanji.kanji, kanji.source_name);
            }
            for vocab in &scheduler.vocab_for_rounds_after_next {
                println!("later\t{}\t{}\t{}", vocab.token, vocab.source_name, vocab.study_from);
            }
            for vocab in &scheduler.uncertain_vocab {
                println!("uncertain\t{}\t{}", vocab.token, vocab.source_name);
            }
        }
        SessionCommand::Finish { plain, no_translate } => {
            let jmdict = load_jmdict(&paths.jmdict_dir())?;
            let sanseido = load_sanseido(&paths.sanseido_dir())?;
            let tatoeba = TatoebaCorpus::load_or_build(&paths.tatoeba_dir(), None)?;
            let frequencies = process_frequency_dictionaries(&paths.frequency_dict_dir())?;
            let translator = if no_translate {
                None
            } else {
                match DeeplTranslator::new(settings.deepl_api_key()) {
                    Ok(translator) => Some(translator),
                    Err(e) => {
                        warn!("Source examples stay untranslated: {}", e);
                        None
                    }
                }
            };

            let builder = CardBuilder::new(&jmdict, settings.cards.clone())
                .with_sanseido(sanseido.as_ref())
                .with_tatoeba(tatoeba.as_ref())
                .with_translator(translator.as_ref().map(|t| t as &dyn Translator))
                .with_frequencies(Some(&frequencies));
            let files = scheduler.end_scheduling(&mut kb, &builder, &paths.cards_dir(), !plain)?;
            delete_data_file(&paths.session_file())?;
            println!("Vocabulary cards: {}", files.vocab.display());
            println!("Kanji cards: {}", files.kanji.display());
            return Ok(());
        }
    }
    save_session(paths, &scheduler)
}

fn run(cli: Cli) -> Result<()> {
    let paths = cli.data_dir.map(AppPaths::new).unwrap_or_default();
    let settings = SettingsData::load(&paths);
    let drop_ascii = settings.drop_ascii_alphanum_tokens();

    match cli.command {
        Command::InitTokenizer => {
            let path = ensure_dictionary(&DictType::Unidic, &paths.tokenizer_dict_dir())?;
            println!("Tokenizer model ready at {}", path.display());
        }
        Command::InstallDict { kind, zips } => {
            let target = match kind {
                DictKind::Jmdict => paths.jmdict_dir(),
                DictKind::Sanseido => paths.sanseido_dir(),
                DictKind::Frequency => paths.frequency_dict_dir(),
            };
            let copied = copy_dictionaries(&zips, &target)?;
            println!("Installed {} dictionaries into {}", copied, target.display());
        }
        Command::IndexTatoeba => {
            let lemmatizer = VibratoLemmatizer::load(&paths.tokenizer_dict_dir())?;
            match TatoebaCorpus::load_or_build(&paths.tatoeba_dir(), Some(&lemmatizer))? {
                Some(corpus) => println!("{} example sentences indexed", corpus.len()),
                None => bail!("No .tsv file in {}", paths.tatoeba_dir().display()),
            }
        }
        Command::AddDoc { path, name, sep } => {
            let name = match name {
                Some(name) => name,
                None => path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .context("Cannot name the document from its path")?,
            };
            let mut kb = KnowledgeBase::open(&paths.kb_dir())?;
            if kb.has_source(&name) {
                return Err(BookToCardsError::DocumentAlreadyExists(name).into());
            }
            let doc = read_document(&path)?;
            let lemmatizer = VibratoLemmatizer::load(&paths.tokenizer_dict_dir())?;
            kb.add_doc(&doc, &name, &lemmatizer, drop_ascii, sep.as_deref())?;
            kb.save(true)?;
            println!("Added {}", name);
        }
        Command::AddText { text } => {
            let mut kb = KnowledgeBase::open(&paths.kb_dir())?;
            let lemmatizer = VibratoLemmatizer::load(&paths.tokenizer_dict_dir())?;
            kb.add_doc(&text, INCR_DOC_NAME, &lemmatizer, drop_ascii, None)?;
            kb.save(true)?;
        }
        Command::AddToken { token, sentence, source } => {
            let mut kb = KnowledgeBase::open(&paths.kb_dir())?;
            let jmdict = load_jmdict(&paths.jmdict_dir())?;
            kb.add_token_with_sequence(&token, sentence.as_deref(), &source, &jmdict)?;
            kb.save(true)?;
        }
        Command::RemoveDoc { name } => {
            let mut kb = KnowledgeBase::open_existing(&paths.kb_dir())?;
            kb.remove_doc(&name);
            kb.save(true)?;
        }
        Command::Docs { all } => {
            let kb = KnowledgeBase::open_existing(&paths.kb_dir())?;
            for name in kb.list_doc_names(all) {
                println!("{}", name);
            }
        }
        Command::Stats { name, min_count } => {
            let kb = KnowledgeBase::open_existing(&paths.kb_dir())?;
            let min_count = min_count.unwrap_or(settings.study.min_count);
            let stats = kb.doc_stats(&name, min_count);
            println!("Stats for {} (tokens seen at least {} times)", name, min_count);
            println!("* Number of tokens: {}", stats.n_tokens);
            println!(
                "* Number of unique tokens: {} (unknown: {})",
                stats.n_unique_tokens, stats.n_unique_tokens_unknown
            );
            println!(
                "* Number of unique kanji: {} (unknown: {})",
                stats.n_unique_kanjis, stats.n_unique_kanjis_unknown
            );
        }
        Command::Studiable { source, kanji, min_count, by_order, limit } => {
            let kb = KnowledgeBase::open_existing(&paths.kb_dir())?;
            let scheduler = match load_json::<Option<Scheduler>>(&paths.session_file())? {
                Some(scheduler) => scheduler,
                None => Scheduler::new(
                    &kb,
                    settings.study.n_days_study,
                    settings.study.n_cards_days,
                    settings.study.min_days_btwn_kanji_and_voc,
                    Local::now().date_naive(),
                )?,
            };
            let limit = limit.unwrap_or(settings.study.n_shown_tokens);
            if kanji {
                print_kanjis(&scheduler.studiable_kanji(&kb, source.as_deref()), limit);
            } else {
                let min_count = min_count.unwrap_or(settings.study.min_count);
                let rows =
                    scheduler.studiable_vocab(&kb, min_count, true, !by_order, source.as_deref());
                print_tokens(&rows, limit);
            }
        }
        Command::MarkKnown { kind, values } => {
            let mut kb = KnowledgeBase::open_existing(&paths.kb_dir())?;
            for value in &values {
                let changed = kb.set_known(kind.into(), value);
                info!("{} marked known in {} sources", value, changed);
            }
            kb.save(true)?;
        }
        Command::Suspend { kind, value, source } => {
            let mut kb = KnowledgeBase::open_existing(&paths.kb_dir())?;
            if kb.set_suspended_for_source(kind.into(), &value, &source) == 0 {
                bail!("No {} in {}", value, source);
            }
            kb.save(true)?;
        }
        Command::Session(command) => run_session(command, &paths, &settings)?,
        Command::Slack { export_dir, out, users, sample_prop } => {
            let options = SlackOptions {
                user_ids: if users.is_empty() { None } else { Some(users) },
                sample_prop: sample_prop.unwrap_or(SlackOptions::default().sample_prop),
                ..SlackOptions::default()
            };
            let summary = extract_slack_export(&export_dir, &out, &options)?;
            println!(
                "{} messages written to {}; add it with `--sep '{}'`",
                summary.n_messages,
                out.display(),
                MSG_SEPARATOR
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    run(Cli::parse())
}
