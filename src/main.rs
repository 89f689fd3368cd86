//! patchscope CLI entry point

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use patchscope::cli::{Cli, Commands, EntitiesArgs, LocateArgs, NodesArgs, OutputFormat, ScoreArgs};
use patchscope::{
    flatten_nodes, locate, modified_nodes, qualify, score_instance, Checkout, EntityTree, Instance,
    Lang, Patch, PatchScopeError,
};

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    match run() {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn run() -> patchscope::Result<String> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Score(args) => run_score(&cli, args),
        Commands::Nodes(args) => run_nodes(&cli, args),
        Commands::Locate(args) => run_locate(&cli, args),
        Commands::Entities(args) => run_entities(&cli, args),
    }
}

fn read_file(path: &Path) -> patchscope::Result<String> {
    if !path.exists() {
        return Err(PatchScopeError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    Ok(fs::read_to_string(path)?)
}

fn run_score(cli: &Cli, args: &ScoreArgs) -> patchscope::Result<String> {
    let reference = read_file(&args.reference)?;
    let predicted = read_file(&args.predicted)?;

    if args.basename {
        let metrics = patchscope::file_retrieval_metrics(
            &Patch::new(&reference),
            &Patch::new(&predicted),
            true,
        );
        return match cli.format {
            OutputFormat::Json => Ok(format!(
                "{}\n",
                serde_json::to_string_pretty(&metrics).map_err(json_error)?
            )),
            OutputFormat::Text => Ok(format!(
                "recall: {:.4}\nprecision: {:.4}\nf1: {:.4}\n",
                metrics.recall, metrics.precision, metrics.f1
            )),
        };
    }

    let instance = Instance {
        instance_id: args.instance_id.clone(),
        repo: args.repo.clone(),
        base_commit: String::new(),
        patch: reference,
        model_patch: predicted,
    };

    let checkout = args.checkout.as_ref().map(Checkout::open);
    let report = score_instance(&instance, checkout.as_ref());

    match cli.format {
        OutputFormat::Json => Ok(format!(
            "{}\n",
            serde_json::to_string_pretty(&report).map_err(json_error)?
        )),
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str(&format!("instance: {}\n", report.instance_id));
            let f = &report.file_retrieval_metrics;
            out.push_str(&format!(
                "files     recall: {:.4}  precision: {:.4}  f1: {:.4}\n",
                f.recall, f.precision, f.f1
            ));
            match &report.node_retrieval_metrics {
                Some(n) => out.push_str(&format!(
                    "entities  recall: {:.4}  precision: {:.4}  f1: {:.4}\n",
                    n.recall, n.precision, n.f1
                )),
                None => out.push_str("entities  (no signal)\n"),
            }
            if cli.verbose {
                for node in &report.reference_nodes {
                    out.push_str(&format!("reference: {}\n", node));
                }
                for node in &report.predicted_nodes {
                    out.push_str(&format!("predicted: {}\n", node));
                }
            }
            Ok(out)
        }
    }
}

fn run_nodes(cli: &Cli, args: &NodesArgs) -> patchscope::Result<String> {
    let patch_text = read_file(&args.patch)?;
    let patch = Patch::new(&patch_text);
    let checkout = Checkout::open(&args.checkout);

    let nodes = modified_nodes(&patch, &checkout)?;
    let flat = flatten_nodes(&nodes);

    match cli.format {
        OutputFormat::Json => {
            let list: Vec<&String> = flat.iter().collect();
            Ok(format!(
                "{}\n",
                serde_json::to_string_pretty(&list).map_err(json_error)?
            ))
        }
        OutputFormat::Text => {
            let mut out = String::new();
            for node in &flat {
                out.push_str(node);
                out.push('\n');
            }
            Ok(out)
        }
    }
}

fn run_locate(cli: &Cli, args: &LocateArgs) -> patchscope::Result<String> {
    let source = read_file(&args.file)?;
    let lang = Lang::from_path(&args.file)?;
    let caps = lang.caps();

    let parsed = patchscope::parse_with_lang(&source, &args.file, lang)?;
    let tree = EntityTree::build(&parsed, &source, None);

    let Some(id) = locate(&tree, caps, args.line)? else {
        return match cli.format {
            OutputFormat::Json => Ok("null\n".to_string()),
            OutputFormat::Text => Ok(format!("line {} is beyond the end of the file\n", args.line)),
        };
    };

    let entity = tree.entity(id);
    if caps.is_top_level(&entity.kind) {
        return Ok(format!("{}\n", entity.kind));
    }

    let path = qualify(&tree, caps, id)?;
    Ok(format!("{}\n", path))
}

fn run_entities(cli: &Cli, args: &EntitiesArgs) -> patchscope::Result<String> {
    let source = read_file(&args.file)?;
    let lang = Lang::from_path(&args.file)?;

    let parsed = patchscope::parse_with_lang(&source, &args.file, lang)?;
    let tree = EntityTree::build(&parsed, &source, args.max_depth);

    if cli.verbose {
        eprintln!("{} entities in {}", tree.len(), args.file.display());
    }

    Ok(tree.render())
}

fn json_error(e: serde_json::Error) -> PatchScopeError {
    PatchScopeError::ParseFailure {
        message: format!("JSON serialization failed: {}", e),
    }
}
