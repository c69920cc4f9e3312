use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, error::ErrorKind};
use indexmap::IndexMap;

use crate::config::{ExhaustionPolicy, SharReaderConfig};
use crate::constants::shar::DEFAULT_SHUFFLE_SEED;
use crate::data::Cut;
use crate::source::LazySharSource;
use crate::source::utilities::distributed::Topology;
use crate::transport::ShardLocation;
use crate::types::FieldName;

#[derive(Debug, Parser)]
#[command(
    name = "shar_inspect",
    disable_help_subcommand = true,
    about = "Inspect a sharded cut dataset",
    long_about = "Count, list, or print cuts from a sharded dataset without loading it into memory.",
    after_help = "Use either --in-dir or one or more --field NAME=LOCATION pairs (the 'cuts' field is required). Locations starting with 'pipe:' run a shell command and read its stdout."
)]
/// CLI for `shar_inspect`.
///
/// Common usage:
/// - Count cuts: `shar_inspect --in-dir data/shar --count`
/// - Show the first ids: `shar_inspect --in-dir data/shar --limit 10`
/// - Show a consumer's shards: `shar_inspect --in-dir data/shar --split --nodes 4 --node-index 1`
struct SharInspectCli {
    #[arg(
        long = "in-dir",
        value_name = "DIR",
        conflicts_with = "fields",
        help = "Directory holding <field>.<shard>.<ext> files"
    )]
    in_dir: Option<PathBuf>,
    #[arg(
        long = "field",
        value_name = "NAME=LOCATION",
        value_parser = parse_field_arg,
        help = "Explicit field location, repeat in shard order"
    )]
    fields: Vec<(FieldName, ShardLocation)>,
    #[arg(long, help = "Print the total cut count and exit")]
    count: bool,
    #[arg(long = "shards", help = "Print this consumer's shard assignment and exit")]
    show_shards: bool,
    #[arg(long, help = "Print full cut JSON instead of ids")]
    json: bool,
    #[arg(long, value_name = "N", help = "Stop after N cuts")]
    limit: Option<usize>,
    #[arg(long, help = "Shuffle shard order")]
    shuffle: bool,
    #[arg(
        long,
        default_value_t = DEFAULT_SHUFFLE_SEED,
        help = "Seed used when shuffling shards"
    )]
    seed: u64,
    #[arg(long, help = "Fail when a field stream ends before the cut manifest")]
    strict: bool,
    #[arg(long, help = "Restrict iteration to this consumer's shards")]
    split: bool,
    #[arg(
        long,
        value_name = "N",
        requires = "split",
        value_parser = parse_positive_usize,
        help = "Node count override (otherwise read from the environment)"
    )]
    nodes: Option<usize>,
    #[arg(long = "node-index", value_name = "I", requires = "nodes", default_value_t = 0)]
    node_index: usize,
    #[arg(
        long,
        value_name = "N",
        requires = "split",
        value_parser = parse_positive_usize,
        help = "Worker count override (otherwise read from the environment)"
    )]
    workers: Option<usize>,
    #[arg(long = "worker-index", value_name = "I", requires = "workers", default_value_t = 0)]
    worker_index: usize,
}

impl SharInspectCli {
    fn reader_config(&self) -> Result<SharReaderConfig, Box<dyn Error>> {
        let mut config = match &self.in_dir {
            Some(dir) => SharReaderConfig::from_dir(dir),
            None if self.fields.is_empty() => SharReaderConfig::default(),
            None => {
                let mut fields: IndexMap<FieldName, Vec<ShardLocation>> = IndexMap::new();
                for (field, location) in &self.fields {
                    fields
                        .entry(field.clone())
                        .or_default()
                        .push(location.clone());
                }
                SharReaderConfig::from_fields(fields)
            }
        };
        config = config.with_split_for_dataloading(self.split);
        if self.shuffle {
            config = config.with_shuffled_shards(self.seed);
        }
        if self.strict {
            config = config.with_exhaustion(ExhaustionPolicy::Strict);
        }
        if self.nodes.is_some() || self.workers.is_some() {
            let topology = Topology::new(
                self.nodes.unwrap_or(1),
                self.node_index,
                self.workers.unwrap_or(1),
                self.worker_index,
            )?;
            config = config.with_context(Arc::new(topology));
        }
        Ok(config)
    }
}

/// Run `shar_inspect` with `args_iter` (program name excluded).
pub fn run_shar_inspect<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let Some(cli) =
        parse_cli::<SharInspectCli, _>(std::iter::once("shar_inspect".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let source = LazySharSource::new(cli.reader_config()?)?;

    if cli.count {
        println!("{}", source.len()?);
        return Ok(());
    }

    if cli.show_shards {
        let shards = if cli.split {
            source.shards_for_dataloading()?
        } else {
            source.shards().to_vec()
        };
        println!(
            "{} of {} shards; fields: {}",
            shards.len(),
            source.num_shards(),
            format_fields(source.fields())
        );
        for shard in shards {
            println!("[{:>6}] {}", shard.index, shard.primary());
        }
        return Ok(());
    }

    let limit = cli.limit.unwrap_or(usize::MAX);
    for cut in source.iter().take(limit) {
        let cut = cut?;
        if cli.json {
            println!("{}", serde_json::to_string(&cut)?);
        } else {
            println!("{}", describe_cut(&cut));
        }
    }
    Ok(())
}

fn describe_cut(cut: &Cut) -> String {
    let fields: Vec<&str> = cut.fields.keys().map(String::as_str).collect();
    match &cut.shard_origin {
        Some(origin) => format!("{}\t[{}]\t{}", cut.id, fields.join(","), origin),
        None => format!("{}\t[{}]", cut.id, fields.join(",")),
    }
}

fn format_fields(fields: &[FieldName]) -> String {
    if fields.is_empty() {
        "(none)".to_string()
    } else {
        fields.join(", ")
    }
}

fn parse_field_arg(raw: &str) -> Result<(FieldName, ShardLocation), String> {
    let Some((field, location)) = raw.split_once('=') else {
        return Err(format!("expected NAME=LOCATION, got '{raw}'"));
    };
    let field = field.trim();
    if field.is_empty() || location.is_empty() {
        return Err(format!("expected NAME=LOCATION, got '{raw}'"));
    }
    Ok((field.to_string(), ShardLocation::parse(location)))
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("could not parse '{raw}' as a positive integer"))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_cuts;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> SharInspectCli {
        SharInspectCli::try_parse_from(std::iter::once("shar_inspect").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn field_arg_parses_paths_and_pipes() {
        let (field, location) = parse_field_arg("cuts=data/cuts.000000.jsonl").unwrap();
        assert_eq!(field, "cuts");
        assert_eq!(
            location,
            ShardLocation::Path(PathBuf::from("data/cuts.000000.jsonl"))
        );

        let (_, location) = parse_field_arg("recording=pipe:cat a=b.tar").unwrap();
        assert_eq!(location, ShardLocation::Pipe("cat a=b.tar".to_string()));

        assert!(parse_field_arg("cuts").is_err());
        assert!(parse_field_arg("=x.jsonl").is_err());
    }

    #[test]
    fn repeated_fields_keep_shard_order() {
        let cli = parse(&[
            "--field",
            "cuts=c0.jsonl",
            "--field",
            "feat=f0.tar",
            "--field",
            "cuts=c1.jsonl",
            "--field",
            "feat=f1.tar",
        ]);
        let config = cli.reader_config().unwrap();
        let fields = config.fields.unwrap();
        assert_eq!(
            fields["cuts"],
            vec![ShardLocation::from("c0.jsonl"), ShardLocation::from("c1.jsonl")]
        );
        assert_eq!(fields["feat"].len(), 2);
    }

    #[test]
    fn topology_flags_require_split() {
        let args = ["shar_inspect", "--in-dir", "x", "--nodes", "2"];
        assert!(SharInspectCli::try_parse_from(args).is_err());

        let cli = parse(&["--in-dir", "x", "--split", "--nodes", "2", "--node-index", "1"]);
        assert!(cli.reader_config().is_ok());

        let cli = parse(&["--in-dir", "x", "--split", "--nodes", "2", "--node-index", "2"]);
        assert!(cli.reader_config().is_err());
    }

    #[test]
    fn help_is_not_an_error() {
        assert!(run_shar_inspect(["--help".to_string()].into_iter()).is_ok());
    }

    #[test]
    fn runs_against_a_directory() {
        let temp = tempdir().unwrap();
        write_cuts(temp.path(), "cuts.000000.jsonl", &["a", "b"]);
        let dir = temp.path().display().to_string();
        let cases: [&[&str]; 4] = [&["--count"], &["--shards"], &["--limit", "1"], &["--json"]];
        for extra in cases {
            let args = ["--in-dir".to_string(), dir.clone()]
                .into_iter()
                .chain(extra.iter().map(|arg| arg.to_string()));
            run_shar_inspect(args).unwrap();
        }
    }

    #[test]
    fn missing_input_is_reported() {
        let err = run_shar_inspect(std::iter::empty()).unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }
}
