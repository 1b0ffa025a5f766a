//! 命令行入口：对本地 HTML 文件执行一次完整的沉浸式词汇替换

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use tokio::task::LocalSet;

use lexiweave::immersion::{
    CachedLookup, ConfigManager, HttpGateway, ImmersionConfig, MemoryVocabularyStore,
    PageSession, RcDomTree, RichDefinitionLookup, ScanMode, StaticDefinitionLookup,
};
use lexiweave::parsers::{get_charset, html_to_dom, serialize_document};

#[derive(Parser, Debug)]
#[command(
    name = "lexiweave",
    version,
    about = "Replace Chinese phrases in an HTML page with words from your vocabulary list"
)]
struct Cli {
    /// Input HTML file
    input: PathBuf,

    /// Vocabulary list (JSON array of entries)
    #[arg(long)]
    vocab: PathBuf,

    /// Configuration file (TOML or JSON); searched in default locations when omitted
    #[arg(long)]
    config: Option<String>,

    /// Page URL used for the site allow/deny lists
    #[arg(long)]
    url: Option<String>,

    /// Output file; prints to stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dictionary with rich definitions (JSON object keyed by word), used by aggressive matching
    #[arg(long)]
    dict: Option<PathBuf>,

    /// Enable aggressive (segmentation + similarity) matching
    #[arg(long, default_value_t = false)]
    aggressive: bool,

    /// Scan the whole page instead of the main content only
    #[arg(long, default_value_t = false)]
    whole_page: bool,

    /// Insert a translated companion block after each block
    #[arg(long, default_value_t = false)]
    bilingual: bool,

    /// Translation API endpoint
    #[arg(long)]
    api_url: Option<String>,

    /// Debug logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let local = LocalSet::new();
    match runtime.block_on(local.run_until(run(cli))) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<ImmersionConfig, Box<dyn std::error::Error>> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::from_path(path)?,
        None => ConfigManager::new()?,
    };
    if let Some(source) = manager.source() {
        tracing::info!("使用配置文件: {}", source);
    }

    let mut config = manager.into_config();
    if cli.aggressive {
        config.matching.aggressive = true;
    }
    if cli.whole_page {
        config.scan.mode = ScanMode::WholePage;
    }
    if cli.bilingual {
        config.display.bilingual = true;
    }
    if let Some(api_url) = &cli.api_url {
        config.engine.api_url = api_url.clone();
    }
    // 本地文件无需等待页面稳定
    config.scan.initial_delay_ms = 0;

    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;

    let data = fs::read(&cli.input)?;
    let mut dom = html_to_dom(&data, "")?;
    let charset = get_charset(&dom.document).unwrap_or_default();
    if !charset.is_empty() && !charset.eq_ignore_ascii_case("utf-8") {
        tracing::debug!("按声明的字符集重新解析: {}", charset);
        dom = html_to_dom(&data, &charset)?;
    }

    let store = MemoryVocabularyStore::from_json_file(&cli.vocab)?;
    let gateway = Rc::new(HttpGateway::new(&config.engine)?);

    let lookup: Option<Rc<dyn RichDefinitionLookup>> = match (&cli.dict, config.matching.aggressive) {
        (Some(path), true) => {
            let dictionary = StaticDefinitionLookup::from_json_file(path)?;
            Some(Rc::new(CachedLookup::new(
                dictionary,
                config.matching.lookup_cache_size,
            )))
        }
        (Some(_), false) => {
            tracing::warn!("未启用激进匹配，忽略词典文件");
            None
        }
        (None, _) => None,
    };

    let tree = Rc::new(RcDomTree::new(dom));
    let session = PageSession::new(tree.clone(), config, gateway, &store, lookup)?;

    let enabled = cli.url.as_deref().map_or(true, |url| session.is_enabled_for(url));
    if enabled {
        session.run_to_completion().await;
    } else {
        tracing::info!("站点不在允许范围内，输出原文档");
    }

    let output = serialize_document(tree.dom(), &charset)?;
    match &cli.output {
        Some(path) => fs::write(path, output)?,
        None => io::stdout().write_all(&output)?,
    }

    Ok(())
}
