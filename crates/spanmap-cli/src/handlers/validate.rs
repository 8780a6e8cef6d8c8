use anyhow::{Result, anyhow};

use spanmap_validate::{
    CheckReport, check_bundle, check_performance, check_signature_collisions, check_yaml_schema,
};

use crate::args::ValidateCommands;
use crate::style::{check_mark, cross_mark};

pub fn run(check: ValidateCommands, _verbose: bool) -> Result<()> {
    let (name, report) = match check {
        ValidateCommands::Yaml { files } => {
            if files.is_empty() {
                return Err(anyhow!("no files given; pass YAML file paths to check"));
            }
            ("YAML schema", check_yaml_schema(&files))
        }
        ValidateCommands::Collisions { files } => {
            if files.is_empty() {
                return Err(anyhow!(
                    "no files given; pass structure_patterns.yaml paths to check"
                ));
            }
            ("Signature uniqueness", check_signature_collisions(&files))
        }
        ValidateCommands::Bundle { bundle } => ("Bundle integrity", check_bundle(&bundle)),
        ValidateCommands::Perf { bundle } => ("Performance", check_performance(&bundle)),
    };

    report_outcome(name, &report)
}

fn report_outcome(name: &str, report: &CheckReport) -> Result<()> {
    for line in &report.diagnostics {
        eprintln!("{}", line);
    }

    if report.ok {
        println!(
            "{} {} check passed ({} files checked)",
            check_mark(),
            name,
            report.files_checked
        );
        Ok(())
    } else {
        println!(
            "{} {} check failed ({} files checked)",
            cross_mark(),
            name,
            report.files_checked
        );
        Err(anyhow!("{} check failed", name.to_lowercase()))
    }
}
