//! # Validate Subcommand
//!
//! Validates one or more document files against a schema file. Each file
//! may hold a `---`-separated stream of documents; every document is
//! validated and reported on its own.
//!
//! Options come from `--config` (YAML, see `ValidationOptions`) and are then
//! overridden by `--max-depth` and `--all-branches`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;

use qschema_core::decode_yaml_stream;
use qschema_schema::{ReductionStrategy, Report, SchemaValidator, ValidationOptions};

/// Output format for validation results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `PASS`/`FAIL` lines.
    #[default]
    Text,
    /// A JSON array with one report per document.
    Json,
}

/// Arguments for the `qschema validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Schema file (YAML or JSON).
    #[arg(long, value_name = "FILE")]
    pub schema: PathBuf,

    /// Validation options file (YAML).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Maximum nesting depth of documents; overrides the config file.
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Report the deepest errors of every failing branch instead of the first.
    #[arg(long)]
    pub all_branches: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Document files to validate (YAML or JSON, multi-document streams allowed).
    #[arg(value_name = "DOCUMENT", required = true)]
    pub documents: Vec<PathBuf>,
}

/// Validation result for one document of one file.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    /// Path of the file the document came from.
    pub file: String,
    /// Zero-based position of the document in the file's stream.
    pub document: usize,
    /// Number of documents in the file.
    #[serde(skip)]
    pub documents_in_file: usize,
    /// Whether the document is valid.
    pub valid: bool,
    /// The report.
    #[serde(flatten)]
    pub report: Report,
}

impl DocumentReport {
    fn label(&self) -> String {
        if self.documents_in_file > 1 {
            format!("{} [document {}]", self.file, self.document + 1)
        } else {
            self.file.clone()
        }
    }
}

/// Execute the validate subcommand.
///
/// Returns exit code: 0 when every document is valid, 1 when any document
/// failed validation. Operational errors are returned as `Err`.
pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let results = validate_documents(args)?;
    print!("{}", render(&results, args.format)?);

    let failed = results.iter().filter(|r| !r.valid).count();
    tracing::info!(
        documents = results.len(),
        failed,
        "validation finished"
    );
    Ok(if failed > 0 { 1 } else { 0 })
}

/// Resolve options: defaults, then the config file, then flags.
pub fn resolve_options(args: &ValidateArgs) -> Result<ValidationOptions> {
    let mut options = match &args.config {
        Some(path) => {
            let text = read_file(path, "config")?;
            ValidationOptions::from_yaml_str(&text)
                .with_context(|| format!("invalid config file {}", path.display()))?
        }
        None => ValidationOptions::default(),
    };
    if let Some(max_depth) = args.max_depth {
        options.max_depth = Some(max_depth);
    }
    if args.all_branches {
        options.reduction = ReductionStrategy::AllBranches;
    }
    Ok(options)
}

/// Validate every document of every file named in `args`.
pub fn validate_documents(args: &ValidateArgs) -> Result<Vec<DocumentReport>> {
    let options = resolve_options(args)?;
    tracing::debug!(?options, "resolved validation options");
    let validator = SchemaValidator::with_quantity_keywords(options)
        .context("failed to build keyword registry")?;

    let schema_text = read_file(&args.schema, "schema")?;
    let schema = validator
        .compile(&schema_text)
        .with_context(|| format!("failed to compile schema {}", args.schema.display()))?;

    let mut results = Vec::new();
    for path in &args.documents {
        let text = read_file(path, "document")?;
        let documents = decode_yaml_stream(&text)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        for (index, document) in documents.iter().enumerate() {
            let report = validator
                .validate_value(&schema, document)
                .with_context(|| {
                    format!("failed to validate {} (document {})", path.display(), index + 1)
                })?;
            results.push(DocumentReport {
                file: path.display().to_string(),
                document: index,
                documents_in_file: documents.len(),
                valid: report.is_valid(),
                report,
            });
        }
    }
    Ok(results)
}

/// Render results in the requested format.
pub fn render(results: &[DocumentReport], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let mut out =
                serde_json::to_string_pretty(results).context("failed to serialize reports")?;
            out.push('\n');
            Ok(out)
        }
        OutputFormat::Text => Ok(render_text(results)),
    }
}

fn render_text(results: &[DocumentReport]) -> String {
    let mut out = String::new();
    for result in results {
        let status = if result.valid { "PASS" } else { "FAIL" };
        out.push_str(&format!("{status}: {}\n", result.label()));
        for error in &result.report.errors {
            out.push_str(&format!("  {error}\n"));
        }
        for warning in &result.report.warnings {
            out.push_str(&format!("  WARN {warning}\n"));
        }
    }
    let failed = results.iter().filter(|r| !r.valid).count();
    out.push_str(&format!(
        "\n{}/{} document(s) passed\n",
        results.len() - failed,
        results.len()
    ));
    out
}

fn read_file(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {what} file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"
type: object
required: [resources]
properties:
  resources:
    type: object
    properties:
      cpu:
        minimumQuantity: 100m
        maximumQuantity: "4"
      memory:
        maximumQuantity: 8Gi
"#;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn args(schema: PathBuf, documents: Vec<PathBuf>) -> ValidateArgs {
        ValidateArgs {
            schema,
            config: None,
            max_depth: None,
            all_branches: false,
            format: OutputFormat::Text,
            documents,
        }
    }

    #[test]
    fn test_valid_documents_exit_zero() {
        let dir = tempfile::tempdir().unwrap();
        let schema = write(dir.path(), "schema.yaml", SCHEMA);
        let doc = write(dir.path(), "pod.yaml", "resources:\n  cpu: 500m\n  memory: 1Gi\n");
        let code = run_validate(&args(schema, vec![doc])).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn test_failing_document_exit_one() {
        let dir = tempfile::tempdir().unwrap();
        let schema = write(dir.path(), "schema.yaml", SCHEMA);
        let doc = write(dir.path(), "pod.yaml", "resources:\n  cpu: 8\n");
        let code = run_validate(&args(schema, vec![doc])).unwrap();
        assert_eq!(code, 1);
    }

    #[test]
    fn test_stream_reports_each_document() {
        let dir = tempfile::tempdir().unwrap();
        let schema = write(dir.path(), "schema.yaml", SCHEMA);
        let doc = write(
            dir.path(),
            "pods.yaml",
            "resources: {cpu: 1}\n---\nresources: {cpu: 10m}\n---\nresources: {memory: 16Gi}\n",
        );
        let results = validate_documents(&args(schema, vec![doc])).unwrap();
        let valid: Vec<bool> = results.iter().map(|r| r.valid).collect();
        assert_eq!(valid, vec![true, false, false]);

        let text = render(&results, OutputFormat::Text).unwrap();
        assert!(text.contains("PASS: "));
        assert!(text.contains("[document 2]"));
        assert!(text.contains("/resources/cpu: 0.01 is lower than minimumQuantity 0.1"));
        assert!(text.ends_with("1/3 document(s) passed\n"));
    }

    #[test]
    fn test_json_output() {
        let dir = tempfile::tempdir().unwrap();
        let schema = write(dir.path(), "schema.yaml", SCHEMA);
        let doc = write(dir.path(), "pod.yaml", "resources:\n  cpu: lots\n");
        let results = validate_documents(&args(schema, vec![doc])).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&render(&results, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json[0]["valid"], true);
        assert_eq!(json[0]["document"], 0);
        let warnings = json[0]["warnings"].as_array().unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().any(|w| w["keyword"] == "minimumQuantity"));
        assert!(warnings
            .iter()
            .all(|w| w["instancePath"] == "/resources/cpu"));
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let schema = write(dir.path(), "schema.yaml", SCHEMA);
        let err = validate_documents(&args(schema, vec![dir.path().join("absent.yaml")]))
            .unwrap_err();
        assert!(format!("{err:#}").contains("cannot read document file"));
    }

    #[test]
    fn test_bad_schema_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let schema = write(dir.path(), "schema.yaml", "maximumQuantity: plenty\n");
        let doc = write(dir.path(), "pod.yaml", "a: 1\n");
        let err = validate_documents(&args(schema, vec![doc])).unwrap_err();
        assert!(format!("{err:#}").contains("failed to compile schema"));
    }

    #[test]
    fn test_non_string_key_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let schema = write(dir.path(), "schema.yaml", SCHEMA);
        let doc = write(dir.path(), "pod.yaml", "resources:\n  1: cpu\n");
        let err = validate_documents(&args(schema, vec![doc])).unwrap_err();
        assert!(format!("{err:#}").contains("non-string"));
    }

    #[test]
    fn test_config_file_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let schema = write(dir.path(), "schema.yaml", SCHEMA);
        let config = write(dir.path(), "qschema.yaml", "maxDepth: 8\nreduction: allBranches\n");
        let mut a = args(schema, vec![]);
        a.config = Some(config);
        let options = resolve_options(&a).unwrap();
        assert_eq!(options.max_depth, Some(8));
        assert_eq!(options.reduction, ReductionStrategy::AllBranches);

        a.max_depth = Some(2);
        assert_eq!(resolve_options(&a).unwrap().max_depth, Some(2));
    }

    #[test]
    fn test_all_branches_flag() {
        let dir = tempfile::tempdir().unwrap();
        let schema = write(dir.path(), "schema.yaml", SCHEMA);
        let doc = write(dir.path(), "pod.yaml", "resources:\n  cpu: 8\n  memory: 10Gi\n");
        let mut a = args(schema, vec![doc]);
        let first = validate_documents(&a).unwrap();
        assert_eq!(first[0].report.errors.len(), 1);
        a.all_branches = true;
        let all = validate_documents(&a).unwrap();
        assert_eq!(all[0].report.errors.len(), 2);
    }
}
