use dispose_scope::{
    DisposeScopeManager, OutOfOrderPolicy, ScopeConfig, StatisticsSnapshot, statistics,
};
use dispose_scope_native::{HeapStats, native_heap};
use facet::Facet;
use figue as args;
use tracing::info;

mod scenarios;

type AnyResult<T> = Result<T, String>;

#[derive(Facet, Debug)]
struct Cli {
    #[facet(flatten)]
    builtins: args::FigueBuiltins,
    #[facet(args::named, default)]
    json: bool,
    #[facet(args::named, default)]
    out_of_order: Option<String>,
    #[facet(args::subcommand)]
    command: CommandKind,
}

#[derive(Facet, Debug)]
#[repr(u8)]
enum CommandKind {
    NestedMoveToOuter,
    DetachOutlivesScope,
    DisposeEverythingBut,
    OutOfOrderEnd,
    TrainingLoop {
        #[facet(args::named, default)]
        iterations: Option<u32>,
    },
}

impl CommandKind {
    fn name(&self) -> &'static str {
        match self {
            Self::NestedMoveToOuter => "nested-move-to-outer",
            Self::DetachOutlivesScope => "detach-outlives-scope",
            Self::DisposeEverythingBut => "dispose-everything-but",
            Self::OutOfOrderEnd => "out-of-order-end",
            Self::TrainingLoop { .. } => "training-loop",
        }
    }
}

#[derive(Facet, Debug)]
struct Report {
    scenario: String,
    statistics: StatisticsSnapshot,
    heap: HeapStats,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> AnyResult<()> {
    let cli = parse_cli()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let manager = DisposeScopeManager::thread_singleton().map_err(|e| e.to_string())?;
    manager.set_config(config_from_cli(&cli)?);

    let before = statistics().snapshot();
    info!(scenario = cli.command.name(), "running scenario");
    match &cli.command {
        CommandKind::NestedMoveToOuter => scenarios::nested_move_to_outer::run()?,
        CommandKind::DetachOutlivesScope => scenarios::detach_outlives_scope::run()?,
        CommandKind::DisposeEverythingBut => scenarios::dispose_everything_but::run()?,
        CommandKind::OutOfOrderEnd => scenarios::out_of_order_end::run()?,
        CommandKind::TrainingLoop { iterations } => {
            scenarios::training_loop::run(iterations.unwrap_or(5))?
        }
    }

    let report = Report {
        scenario: cli.command.name().to_owned(),
        statistics: statistics().snapshot().since(&before),
        heap: native_heap().stats(),
    };
    if cli.json {
        let json = facet_json::to_string(&report).map_err(|e| e.to_string())?;
        println!("{json}");
    } else {
        println!("\n{} finished", report.scenario);
        println!("{}", report.statistics);
        println!("live native blocks:     {}", report.heap.live_blocks);
    }
    Ok(())
}

fn parse_cli() -> AnyResult<Cli> {
    let figue_config = args::builder::<Cli>()
        .map_err(|e| format!("failed to build CLI schema: {e}"))?
        .cli(|cli| cli.strict())
        .help(|h| {
            h.program_name("dispose-scope-examples")
                .description("Run dispose-scope scenarios as subcommands")
                .version(option_env!("CARGO_PKG_VERSION").unwrap_or("dev"))
        })
        .build();

    args::Driver::new(figue_config)
        .run()
        .into_result()
        .map(|v| v.value)
        .map_err(|e| e.to_string())
}

fn config_from_cli(cli: &Cli) -> AnyResult<ScopeConfig> {
    match cli.out_of_order.as_deref() {
        Some(value) => Ok(ScopeConfig {
            out_of_order_end: OutOfOrderPolicy::parse(value).map_err(|e| e.to_string())?,
        }),
        None => ScopeConfig::from_env().map_err(|e| e.to_string()),
    }
}
