//! Binary entry point for the weir CLI.

mod cli;

use std::io::{self, Write};
use std::process;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use clap::Parser;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use weir::transport::TransportFuture;
use weir::{
    ApiRequest, ObservedState, ReadOutcome, ReconcileError, ReconcileErrorKind, Reconciler,
    Redirect, ResourceHandle, ResourceKind, RobotsTxt, Site, Transport, TransportError,
    WebflowConfig, logging,
};

use cli::{Cli, KindArg};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("failed to read {path}: {message}")]
    Input { path: String, message: String },
    #[error("failed to render output: {0}")]
    Output(String),
    #[error("error[{}]: {}", .0.code(), .0)]
    Reconcile(#[from] ReconcileError),
}

impl CliError {
    const fn exit_code(&self) -> i32 {
        match self {
            Self::Reconcile(_) => 1,
            Self::Config(_) | Self::Input { .. } | Self::Output(_) => 2,
        }
    }
}

/// Transport for commands that must never reach Webflow.
struct Offline;

impl Transport for Offline {
    fn execute<'a>(
        &'a self,
        request: &'a ApiRequest,
        _cancel: &'a CancellationToken,
    ) -> TransportFuture<'a> {
        Box::pin(async move {
            Err(TransportError::InvalidRequest {
                method: request.method.clone(),
                path: request.path.clone(),
                message: String::from("remote calls are disabled for this command"),
            })
        })
    }
}

#[derive(Serialize)]
struct CreateOutput<'a, S> {
    handle: &'a ResourceHandle,
    state: &'a S,
}

#[derive(Serialize)]
struct ReadOutput<'a, S> {
    present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a S>,
}

#[derive(Serialize)]
struct DeleteOutput<'a> {
    deleted: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PartialOutput<'a> {
    handle: &'a str,
    state: &'a serde_json::Value,
    failed_action: &'a str,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = logging::init() {
        writeln!(io::stderr(), "{err}").ok();
    }

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let exit_code = match dispatch(cli, &cancel).await {
        Ok(rendered) => {
            writeln!(io::stdout(), "{rendered}").ok();
            0
        }
        Err(err) => {
            report_error(&err);
            err.exit_code()
        }
    };

    process::exit(exit_code);
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling");
            cancel.cancel();
        }
    });
}

async fn dispatch(cli: Cli, cancel: &CancellationToken) -> Result<String, CliError> {
    match cli.kind() {
        KindArg::Site => run::<Site>(cli, cancel).await,
        KindArg::Redirect => run::<Redirect>(cli, cancel).await,
        KindArg::RobotsTxt => run::<RobotsTxt>(cli, cancel).await,
    }
}

async fn run<K: ResourceKind>(cli: Cli, cancel: &CancellationToken) -> Result<String, CliError> {
    match cli {
        Cli::Create(cmd) => {
            let desired: K::Desired = read_json(&cmd.desired)?;
            let applied = if cmd.dry_run {
                Reconciler::<K, _>::new(Offline).plan_create(&desired)?
            } else {
                Reconciler::<K, _>::new(remote_transport()?)
                    .apply_create(&desired, cancel)
                    .await?
            };
            render(&CreateOutput {
                handle: &applied.handle,
                state: &applied.observed,
            })
        }
        Cli::Read(cmd) => {
            let prior: Option<ObservedState<K>> =
                cmd.prior.as_deref().map(read_json::<ObservedState<K>>).transpose()?;
            let outcome = Reconciler::<K, _>::new(remote_transport()?)
                .read(&cmd.handle, prior.as_ref(), cancel)
                .await?;
            let state = match &outcome {
                ReadOutcome::Present(state) => Some(state),
                ReadOutcome::Absent => None,
            };
            render(&ReadOutput {
                present: state.is_some(),
                state,
            })
        }
        Cli::Update(cmd) => {
            let desired: K::Desired = read_json(&cmd.desired)?;
            let observed: ObservedState<K> = read_json(&cmd.observed)?;
            let updated = if cmd.dry_run {
                Reconciler::<K, _>::new(Offline).plan_update(&cmd.handle, &desired, &observed)?
            } else {
                Reconciler::<K, _>::new(remote_transport()?)
                    .apply_update(&cmd.handle, &desired, &observed, cancel)
                    .await?
            };
            render(&updated)
        }
        Cli::Delete(cmd) => {
            Reconciler::<K, _>::new(remote_transport()?)
                .delete(&cmd.handle, cancel)
                .await?;
            render(&DeleteOutput {
                deleted: &cmd.handle,
            })
        }
        Cli::Diff(cmd) => {
            let desired: K::Desired = read_json(&cmd.desired)?;
            let observed: ObservedState<K> = read_json(&cmd.observed)?;
            render(&Reconciler::<K, _>::new(Offline).diff(&observed, &desired))
        }
    }
}

fn remote_transport() -> Result<impl Transport, CliError> {
    WebflowConfig::load_without_cli_args()
        .and_then(|config| config.transport())
        .map_err(|err| CliError::Config(err.to_string()))
}

fn read_json<T: DeserializeOwned>(path: &str) -> Result<T, CliError> {
    let input_error = |message: String| CliError::Input {
        path: path.to_owned(),
        message,
    };
    let contents = read_to_string_ambient(path).map_err(input_error)?;
    serde_json::from_str(&contents).map_err(|err| input_error(err.to_string()))
}

fn read_to_string_ambient(path: &str) -> Result<String, String> {
    let path_buf = Utf8Path::new(path);

    let (dir_path, file_path) = if path_buf.is_absolute() {
        let parent = path_buf
            .parent()
            .ok_or_else(|| format!("path has no parent directory: {path_buf}"))?;
        let file_name = path_buf
            .file_name()
            .ok_or_else(|| format!("path has no file name: {path_buf}"))?;
        (parent, Utf8Path::new(file_name))
    } else {
        (Utf8Path::new("."), path_buf)
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_path).map_err(|err| err.to_string())
}

fn render<T: Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    if let CliError::Reconcile(ReconcileError {
        kind:
            ReconcileErrorKind::PartialSuccess {
                handle,
                committed,
                action,
                ..
            },
        ..
    }) = err
    {
        let partial = PartialOutput {
            handle,
            state: committed,
            failed_action: action,
        };
        if let Ok(rendered) = render(&partial) {
            writeln!(io::stdout(), "{rendered}").ok();
        }
    }
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
