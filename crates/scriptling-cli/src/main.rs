//! The `scriptling` binary: run a script, lint files, start a REPL, or
//! serve tools and HTTP routes.

mod repl;

use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use scriptling::{
    DirLoader, Interp, LibraryLoader, PathPolicy, RunLimits, format_text, lint_files,
};
use scriptling_mcp::{INTERP_STACK_SIZE, ServeConfig, TlsConfig, serve};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LintFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "scriptling",
    version,
    about = "An embeddable Python-subset interpreter with an MCP tool server and HTTP route host."
)]
struct Cli {
    /// Script file(s): the script to run, the lint targets, or the server
    /// setup script.
    scripts: Vec<PathBuf>,

    /// Enable the HTTP server on `host:port`.
    #[arg(long, env = "SCRIPTLING_SERVER")]
    server: Option<String>,

    /// Tool directory of `*.toml` + `*.py` pairs; enables `/mcp`.
    #[arg(long = "mcp-tools", env = "SCRIPTLING_MCP_TOOLS")]
    mcp_tools: Option<PathBuf>,

    /// Register the built-in `execute_script` tool (unrestricted; off by
    /// default).
    #[arg(long = "mcp-exec-script", env = "SCRIPTLING_MCP_EXEC_SCRIPT")]
    mcp_exec_script: bool,

    /// Require `Authorization: Bearer <token>` on every request.
    #[arg(long = "bearer-token", env = "SCRIPTLING_BEARER_TOKEN")]
    bearer_token: Option<String>,

    /// Comma-separated path allowlist for filesystem builtins; `-` denies
    /// all, empty allows all.
    #[arg(long = "allowed-paths", env = "SCRIPTLING_ALLOWED_PATHS")]
    allowed_paths: Option<String>,

    /// TLS certificate file (PEM).
    #[arg(long = "tls-cert", env = "SCRIPTLING_TLS_CERT")]
    tls_cert: Option<PathBuf>,

    /// TLS private key file (PEM).
    #[arg(long = "tls-key", env = "SCRIPTLING_TLS_KEY")]
    tls_key: Option<PathBuf>,

    /// Mint a self-signed certificate (not supported by this build).
    #[arg(long = "tls-generate", env = "SCRIPTLING_TLS_GENERATE")]
    tls_generate: bool,

    /// Root directory for on-demand `*.py` library loading.
    #[arg(long, env = "SCRIPTLING_LIBDIR")]
    libdir: Option<PathBuf>,

    /// Parse-only mode: report diagnostics without executing.
    #[arg(long)]
    lint: bool,

    /// Output format for --lint.
    #[arg(long = "lint-format", value_enum, default_value = "text")]
    lint_format: LintFormat,

    /// Start an interactive REPL.
    #[arg(long)]
    interactive: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.lint {
        return run_lint(&cli);
    }
    if cli.interactive {
        return repl::run(build_interp(&cli));
    }
    if cli.server.is_some() {
        return run_server(cli);
    }
    run_script(&cli)
}

fn path_policy(cli: &Cli) -> PathPolicy {
    cli.allowed_paths
        .as_deref()
        .map_or_else(PathPolicy::default, PathPolicy::parse)
}

fn build_interp(cli: &Cli) -> Interp {
    let mut builder = Interp::builder().path_policy(path_policy(cli));
    if let Some(libdir) = &cli.libdir {
        let loader: Arc<dyn LibraryLoader> = Arc::new(DirLoader::new(libdir.clone()));
        builder = builder.loader(loader);
    }
    builder.build()
}

// ----------------------------------------------------------------------
// Lint mode
// ----------------------------------------------------------------------

fn run_lint(cli: &Cli) -> ExitCode {
    if cli.scripts.is_empty() {
        eprintln!("error: --lint requires at least one file");
        return ExitCode::FAILURE;
    }
    let report = lint_files(&cli.scripts);
    match cli.lint_format {
        LintFormat::Text => print!("{}", format_text(&report)),
        LintFormat::Json => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("error: cannot encode report: {err}");
                return ExitCode::FAILURE;
            }
        },
    }
    if report.has_errors {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

// ----------------------------------------------------------------------
// Script mode
// ----------------------------------------------------------------------

/// Thread-safe summary of a script failure; the exception itself holds
/// interpreter-local values and stays on the interpreter thread.
struct RunFailure {
    system_exit: bool,
    exit_code: i64,
    line: Option<u32>,
    message: String,
}

fn run_script(cli: &Cli) -> ExitCode {
    let Some(path) = cli.scripts.first().cloned() else {
        eprintln!("error: no script given (try --help)");
        return ExitCode::FAILURE;
    };
    let source = match std::fs::read_to_string(&path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: cannot read {}: {err}", path.display());
            return ExitCode::FAILURE;
        }
    };

    let policy = path_policy(cli);
    let libdir = cli.libdir.clone();
    let name = path.display().to_string();

    // The interpreter is built and torn down entirely on a dedicated thread:
    // the evaluator needs stack headroom at the default call-depth limit.
    let result = std::thread::Builder::new()
        .stack_size(INTERP_STACK_SIZE)
        .spawn(move || {
            let mut builder = Interp::builder().path_policy(policy);
            if let Some(libdir) = libdir {
                let loader: Arc<dyn LibraryLoader> = Arc::new(DirLoader::new(libdir));
                builder = builder.loader(loader);
            }
            let mut interp = builder.build();
            interp.set_limits(RunLimits::new());
            interp.run(&source, &name).map(|_| ()).map_err(|exc| RunFailure {
                system_exit: exc.is_system_exit(),
                exit_code: exc.exit_code.unwrap_or(0),
                line: exc.line,
                message: exc.to_string(),
            })
        })
        .and_then(|handle| {
            handle
                .join()
                .map_err(|_| std::io::Error::other("interpreter thread panicked"))
        });

    match result {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(failure)) if failure.system_exit => exit_code_from(failure.exit_code),
        Ok(Err(failure)) => {
            match failure.line {
                Some(line) => eprintln!("{}:{line}: {}", path.display(), failure.message),
                None => eprintln!("{}: {}", path.display(), failure.message),
            }
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn exit_code_from(code: i64) -> ExitCode {
    ExitCode::from(u8::try_from(code.clamp(0, 255)).unwrap_or(1))
}

// ----------------------------------------------------------------------
// Server mode
// ----------------------------------------------------------------------

fn run_server(cli: Cli) -> ExitCode {
    if cli.tls_generate {
        eprintln!(
            "error: --tls-generate is not supported; provide --tls-cert and --tls-key, \
             or terminate TLS in front of the server"
        );
        return ExitCode::FAILURE;
    }
    let tls = match (&cli.tls_cert, &cli.tls_key) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert: cert.clone(),
            key: key.clone(),
        }),
        (None, None) => None,
        _ => {
            eprintln!("error: --tls-cert and --tls-key must be given together");
            return ExitCode::FAILURE;
        }
    };

    let config = ServeConfig {
        addr: cli.server.clone().unwrap_or_default(),
        tool_dir: cli.mcp_tools.clone(),
        exec_script_tool: cli.mcp_exec_script,
        bearer_token: cli.bearer_token.clone(),
        path_policy: path_policy(&cli),
        tls,
        libdir: cli.libdir.clone(),
        setup_script: cli.scripts.first().cloned(),
        tool_timeout: Duration::from_secs(60),
    };

    // Worker and blocking threads both run interpreters; give them the
    // same stack headroom as standalone script runs.
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(INTERP_STACK_SIZE)
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: cannot start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
