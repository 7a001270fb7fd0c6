use anyhow::{anyhow, Context};
use clap::Parser;
use std::path::PathBuf;
use steptrace::config::Config;
use steptrace::console::AppBuilder;
use steptrace::proto::Language;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Trace server address, host:port
    #[arg(long, env = "STEPTRACE_SERVER")]
    server: Option<String>,

    /// Source language (c, cxx or asm)
    #[arg(long, default_value = "c")]
    lang: String,

    /// Extra arguments for the remote compiler
    #[arg(long, default_value = "")]
    args: String,

    /// Resume an existing session by its identifier
    #[arg(long)]
    session: Option<String>,

    /// Source file to load on startup
    source: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = Config::load().context("read configuration")?;
    let server = args
        .server
        .unwrap_or_else(|| config.server().to_string());
    let lang = args
        .lang
        .parse::<Language>()
        .map_err(|_| anyhow!("unknown language `{}`", args.lang))?;
    let source = args
        .source
        .as_ref()
        .map(std::fs::read_to_string)
        .transpose()
        .context("read source file")?;

    let app = AppBuilder::new(server, lang)
        .with_auto_step_delay(config.auto_step_delay())
        .with_compile_args(args.args)
        .with_source(source)
        .with_resume(args.session)
        .build()?;

    // all engine work is cooperative on this one thread; requests and retry
    // timers are the only suspension points
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(app.run())
}
