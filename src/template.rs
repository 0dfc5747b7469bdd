//! Template assembly and output
//!
//! Collects synthesized resources into a CloudFormation template and writes
//! it as JSON or YAML. Resources are keyed by logical ID in a key-ordered
//! map, so byte-identical input produces byte-identical output.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde_json::{json, Map, Value};
use std::path::Path;

const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Output serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

/// A CloudFormation template under construction.
#[derive(Debug, Clone, Default)]
pub struct Template {
    description: String,
    resources: Map<String, Value>,
}

impl Template {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            resources: Map::new(),
        }
    }

    /// Add a resource under its logical ID. Identical logical IDs collapse
    /// into one entry, which is exactly right: the ID is content-derived, so
    /// a duplicate means the same resource appeared twice in the snapshot.
    pub fn insert(&mut self, logical_id: &str, resource_type: &str, properties: Value) {
        self.resources.insert(
            logical_id.to_string(),
            json!({
                "Type": resource_type,
                "Properties": properties,
            }),
        );
    }

    pub fn contains(&self, logical_id: &str) -> bool {
        self.resources.contains_key(logical_id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// The full template document.
    pub fn to_value(&self) -> Value {
        json!({
            "AWSTemplateFormatVersion": TEMPLATE_FORMAT_VERSION,
            "Description": self.description,
            "Resources": Value::Object(self.resources.clone()),
        })
    }

    /// Serialize in the requested format.
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        let value = self.to_value();
        match format {
            OutputFormat::Json => {
                let mut out = serde_json::to_string_pretty(&value)
                    .context("Could not serialise template to JSON")?;
                out.push('\n');
                Ok(out)
            }
            OutputFormat::Yaml => {
                serde_yaml::to_string(&value).context("Could not serialise template to YAML")
            }
        }
    }

    /// Write to a file, or stdout when no path is given.
    pub fn write(&self, path: Option<&Path>, format: OutputFormat) -> Result<()> {
        let rendered = self.render(format)?;
        match path {
            Some(path) => std::fs::write(path, rendered)
                .with_context(|| format!("Could not write template to `{}`", path.display())),
            None => {
                print!("{rendered}");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_value_has_cfn_header() {
        let mut template = Template::new("test");
        template.insert("ResAbc", "AWS::SQS::Queue", json!({"QueueName": "q"}));

        let value = template.to_value();
        assert_eq!(value["AWSTemplateFormatVersion"], TEMPLATE_FORMAT_VERSION);
        assert_eq!(value["Resources"]["ResAbc"]["Type"], "AWS::SQS::Queue");
        assert_eq!(
            value["Resources"]["ResAbc"]["Properties"]["QueueName"],
            "q"
        );
    }

    #[test]
    fn duplicate_logical_ids_collapse() {
        let mut template = Template::new("test");
        template.insert("ResAbc", "AWS::SQS::Queue", json!({"QueueName": "q"}));
        template.insert("ResAbc", "AWS::SQS::Queue", json!({"QueueName": "q"}));
        assert_eq!(template.len(), 1);
    }

    #[test]
    fn renders_both_formats() {
        let mut template = Template::new("test");
        template.insert("ResAbc", "AWS::SNS::Topic", json!({"TopicName": "t"}));

        let json_out = template.render(OutputFormat::Json).unwrap();
        assert!(json_out.contains("\"AWS::SNS::Topic\""));

        let yaml_out = template.render(OutputFormat::Yaml).unwrap();
        assert!(yaml_out.contains("AWS::SNS::Topic"));
    }

    #[test]
    fn resource_keys_are_ordered() {
        let mut template = Template::new("test");
        template.insert("ResB", "AWS::SNS::Topic", json!({}));
        template.insert("ResA", "AWS::SNS::Topic", json!({}));

        let rendered = template.render(OutputFormat::Json).unwrap();
        let a = rendered.find("ResA").unwrap();
        let b = rendered.find("ResB").unwrap();
        assert!(a < b);
    }
}
