// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jamie Adams (a.k.a, Imodium Operator)
//! Thin front-end over `umrs-ifdif-core`: `vertical` orders a directory of
//! policy snapshots by incremental version and diffs consecutive ones;
//! `policy` compares two explicit snapshot directories directly
//! (`spec.md` §6).
//!
//! Each policy directory is expected to hold `build.prop`,
//! `plat_file_contexts`, `vendor_file_contexts`, and `rules.txt` (the
//! `TextPolicyRuleSource` stand-in for a real sepolicy decoder's rule
//! stream), plus an optional `db/file_contexts.db` cache written by a
//! prior `--save`/`--load` run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use umrs_ifdif_core::decoder::TextPolicyRuleSource;
use umrs_ifdif_core::file_context::FileContext;
use umrs_ifdif_core::permmap::PermissionMap;
use umrs_ifdif_core::policy::{fc_diff, security_lvs_diff, type_diff, Policy};
use umrs_ifdif_core::product::ProductGraph;
use umrs_ifdif_core::query;

/// Mirrors the original tool's `main.py` queries, exercised here to give the
/// `policy` subcommand something to report beyond the three diff stages.
const SAMPLE_QUERIES: &[&str] = &[
    "label_2(CRITICAL) and not label_1(CRITICAL)",
    "ito_2(label_2(CRITICAL) and not ito_1(label_2(CRITICAL)))",
    "(label_2(UNTRUSTED) and ito_2(label_2(CRITICAL))) and not (label_2(UNTRUSTED) and ito_1(label_2(CRITICAL)))",
    "(label_2(UNTRUSTED) and ito_2(label_2(CRITICAL))) and not (label_1(UNTRUSTED) and ito_1(label_1(CRITICAL)))",
    "(label_2(UNTRUSTED) and ito_2(label_2(CRITICAL)) and label_1(UNTRUSTED)) and not ito_1(label_1(CRITICAL))",
    "(label_2(CRITICAL) and ifrom_2(label_2(UNTRUSTED))) and not (label_2(CRITICAL) and ifrom_1(label_2(UNTRUSTED)))",
    "(ito_2(label_2(CRITICAL)) and label_1(UNTRUSTED)) and not label_2(TRUSTED)",
];

const EXTRACTED_ROOT: &str = "policies";
const FC_CACHE_REL: &str = "db/file_contexts.db";

#[derive(Parser, Debug)]
#[command(name = "umrs-ifdif", about = "Compares SEAndroid policy information flow across snapshots")]
struct Cli {
    /// Prints debug info.
    #[arg(short, long)]
    verbose: bool,

    /// Assume policies are laid out under a shared extracted-policies root.
    #[arg(short = 'e', long)]
    extracted: bool,

    /// Path to the permission map to use (defaults to an empty map).
    #[arg(short = 'm', long)]
    permmap: Option<PathBuf>,

    /// File contexts are saved to db.
    #[arg(short, long, conflicts_with = "load")]
    save: bool,

    /// Attempt to load file contexts from db; load from files and save otherwise.
    #[arg(short, long, conflicts_with = "save")]
    load: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare policies of the same vendor/device.
    Vertical {
        /// A specific vendor if `-e` is used, or the path to a collection of policies.
        vendor: String,
        /// A specific device, when `-e` is used.
        device: Option<String>,
    },
    /// Compare the two provided policies.
    Policy {
        first: PathBuf,
        second: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let permmap = load_permmap(cli.permmap.as_deref())?;

    match &cli.command {
        Command::Vertical { vendor, device } => {
            let root = vertical_root(&cli, vendor, device.as_deref());
            run_vertical(&root, &permmap, cli.load, cli.save)
        }
        Command::Policy { first, second } => {
            run_policy(first, second, &permmap, cli.load, cli.save)
        }
    }
}

fn vertical_root(cli: &Cli, vendor: &str, device: Option<&str>) -> PathBuf {
    if !cli.extracted {
        return PathBuf::from(vendor);
    }
    let mut root = PathBuf::from(EXTRACTED_ROOT).join(vendor);
    if let Some(device) = device {
        root = root.join(device);
    }
    root
}

fn load_permmap(path: Option<&Path>) -> Result<PermissionMap> {
    let Some(path) = path else {
        return Ok(PermissionMap::new());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading permission map {}", path.display()))?;
    PermissionMap::from_text(&text)
        .map_err(|e| anyhow::anyhow!("malformed permission map {}: {e}", path.display()))
}

fn run_vertical(root: &Path, permmap: &PermissionMap, load: bool, save: bool) -> Result<()> {
    info!("starting vertical comparison of policies under {}", root.display());

    let mut dirs: Vec<PathBuf> = fs::read_dir(root)
        .with_context(|| format!("reading policy root {}", root.display()))?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    info!("found {} policies", dirs.len());

    let mut policies: Vec<Policy> = Vec::with_capacity(dirs.len());
    for (count, dir) in dirs.iter().enumerate() {
        policies.push(load_policy_dir(dir, permmap, load, save, count)?);
    }
    policies.sort_by_key(|p| p.properties.version_incremental);

    info!("ordering policies for vertical comparison:");
    for (count, policy) in policies.iter().enumerate() {
        info!(
            "  #{}: {} v{}.{} ({})",
            count + 1,
            policy.path,
            policy.properties.version_major,
            policy.properties.version_incremental,
            policy.properties.security_patch
        );
    }

    for i in 0..policies.len().saturating_sub(1) {
        report_pair(&policies[i], &policies[i + 1], i + 1, i + 2);
    }

    Ok(())
}

fn run_policy(
    first: &Path,
    second: &Path,
    permmap: &PermissionMap,
    load: bool,
    save: bool,
) -> Result<()> {
    info!("starting comparison of the specified policies");
    let left = load_policy_dir(first, permmap, load, save, 0)?;
    let right = load_policy_dir(second, permmap, load, save, 1)?;
    report_pair(&left, &right, 1, 2);

    let graph = ProductGraph::build(&left, &right);
    info!("built product graph: {} nodes", graph.nodes.len());

    for query_text in SAMPLE_QUERIES {
        let formula = query::parse(query_text)
            .with_context(|| format!("parsing query {query_text:?}"))?;
        let model = query::eval(&formula, &graph, &left, &right)
            .with_context(|| format!("evaluating query {query_text:?}"))?;
        log::debug!("{query_text} => {model:?}");
    }
    info!("performed {} queries", SAMPLE_QUERIES.len());

    Ok(())
}

fn report_pair(left: &Policy, right: &Policy, idx_left: usize, idx_right: usize) {
    let lines = fc_diff(left, right);
    let changed = lines
        .iter()
        .filter(|l| !matches!(l, umrs_ifdif_core::policy::FcDiffLine::Unchanged(_)))
        .count();
    if changed > 0 {
        info!("  #{idx_left} --> #{idx_right} file-context changes ({changed} lines)");
    }

    let diff = type_diff(left, right);
    if !diff.nodes_only_left.is_empty()
        || !diff.nodes_only_right.is_empty()
        || !diff.edges_only_left.is_empty()
        || !diff.edges_only_right.is_empty()
    {
        info!(
            "  #{idx_left} --> #{idx_right} nodes (-{}, +{}) edges (-{}, +{})",
            diff.nodes_only_left.len(),
            diff.nodes_only_right.len(),
            diff.edges_only_left.len(),
            diff.edges_only_right.len()
        );
    }

    let lvs = security_lvs_diff(left, right);
    if !lvs.labels.is_empty() {
        info!("  #{idx_left} --> #{idx_right} security-level regressions: {:?}", lvs.labels);
    }
}

fn load_policy_dir(
    dir: &Path,
    permmap: &PermissionMap,
    load: bool,
    save: bool,
    count: usize,
) -> Result<Policy> {
    if !dir.exists() {
        bail!("the specified policy ({}) was not found", dir.display());
    }
    info!("loading policy #{} ({})", count + 1, dir.display());

    let build_prop = fs::read_to_string(dir.join("build.prop"))
        .with_context(|| format!("reading {}/build.prop", dir.display()))?;
    let rules_text = fs::read_to_string(dir.join("rules.txt"))
        .with_context(|| format!("reading {}/rules.txt", dir.display()))?;
    let rule_source = TextPolicyRuleSource::parse(&rules_text)
        .map_err(|e| anyhow::anyhow!("malformed rules in {}: {e}", dir.display()))?;

    let path_str = dir.to_string_lossy().into_owned();
    let db_path = dir.join(FC_CACHE_REL);

    let policy = if load && db_path.exists() {
        let cache_text = fs::read_to_string(&db_path)
            .with_context(|| format!("reading {}", db_path.display()))?;
        let file_contexts = parse_file_contexts_cache(&cache_text)?;
        Policy::load_with_cached_file_contexts(
            &path_str,
            &rule_source,
            file_contexts,
            permmap,
            &build_prop,
        )?
    } else {
        let plat_fc = fs::read_to_string(dir.join("plat_file_contexts"))
            .with_context(|| format!("reading {}/plat_file_contexts", dir.display()))?;
        let vendor_fc = fs::read_to_string(dir.join("vendor_file_contexts"))
            .with_context(|| format!("reading {}/vendor_file_contexts", dir.display()))?;
        Policy::load(&path_str, &rule_source, &plat_fc, &vendor_fc, permmap, &build_prop)?
    };

    if save || (load && !db_path.exists()) {
        save_file_contexts_cache(&db_path, &policy)?;
    }

    Ok(policy)
}

fn parse_file_contexts_cache(text: &str) -> Result<BTreeMap<String, FileContext>> {
    let mut out = BTreeMap::new();
    let mut rest = text;
    while let Some(begin) = rest.find("--BEGIN--") {
        let after = &rest[begin..];
        let Some(end) = after.find("--END--") else {
            break;
        };
        let record = &after[..end + "--END--".len()];
        let fc = FileContext::deserialize(record)
            .map_err(|e| anyhow::anyhow!("malformed file-context cache record: {e}"))?;
        out.insert(fc.type_label.clone(), fc);
        rest = &after[end + "--END--".len()..];
    }
    Ok(out)
}

fn save_file_contexts_cache(db_path: &Path, policy: &Policy) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let mut out = String::new();
    for fc in policy.file_contexts.values() {
        out.push_str(&fc.serialize());
    }
    fs::write(db_path, out).with_context(|| format!("writing {}", db_path.display()))
}
