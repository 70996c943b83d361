//! Declarative layout manifests
//!
//! A manifest describes a layout tree in TOML and is built through the
//! ordinary `Builder` API, so it obeys exactly the same validation:
//!
//! ```toml
//! padding = "packed"
//!
//! [[node]]
//! axes = ["i", "j"]
//! extents = [16, 16]
//!
//!   [[node.node]]
//!   axes = ["i", "j"]
//!   extents = [8, 8]
//!   fields = [{ name = "x", dtype = "f32" }, { name = "y", dtype = "f32" }]
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::axis::Axis;
use crate::builder::{Builder, NodeHandle};
use crate::config::LayoutConfig;
use crate::dtype::DataType;
use crate::error::{config_error, LayoutError, LayoutResult};
use crate::field::Field;
use crate::padding::PaddingPolicy;
use crate::tree::LayoutTree;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldManifest {
    pub name: String,
    pub dtype: DataType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeManifest {
    pub axes: Vec<Axis>,
    pub extents: Vec<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldManifest>,
    #[serde(default, rename = "node", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeManifest>,
}

/// A whole layout tree description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutManifest {
    /// Overrides the process-wide padding policy when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<PaddingPolicy>,
    /// Zero-dimensional fields placed on the root
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldManifest>,
    #[serde(default, rename = "node", skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeManifest>,
}

/// A finalized manifest: the tree plus its fields in declaration order
#[derive(Debug)]
pub struct BuiltLayout {
    pub tree: LayoutTree,
    pub fields: Vec<Field>,
}

impl BuiltLayout {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name() == name)
    }
}

impl LayoutManifest {
    pub fn from_toml_str(source: &str) -> LayoutResult<Self> {
        toml::from_str(source).map_err(config_error)
    }

    pub fn load(path: impl AsRef<Path>) -> LayoutResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| config_error(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> LayoutResult<String> {
        toml::to_string(self).map_err(config_error)
    }

    /// Declare the manifest into `builder`, returning the created fields
    pub fn declare(&self, builder: &mut Builder) -> LayoutResult<Vec<Field>> {
        let mut names = HashSet::new();
        let mut fields = Vec::new();
        let root = builder.root();

        place_fields(builder, root, &self.fields, &mut names, &mut fields)?;
        for node in &self.nodes {
            declare_node(builder, root, node, &mut names, &mut fields)?;
        }
        Ok(fields)
    }

    /// Build with the manifest's padding, or the process-wide configuration
    pub fn build(&self) -> LayoutResult<BuiltLayout> {
        let builder = match self.padding {
            Some(padding) => Builder::with_padding(padding),
            None => Builder::new(),
        };
        self.finish(builder)
    }

    /// Build with an explicit configuration; the manifest's padding still wins
    pub fn build_with(&self, config: LayoutConfig) -> LayoutResult<BuiltLayout> {
        let config = match self.padding {
            Some(padding) => config.with_padding(padding),
            None => config,
        };
        self.finish(Builder::with_config(config))
    }

    fn finish(&self, mut builder: Builder) -> LayoutResult<BuiltLayout> {
        let fields = self.declare(&mut builder)?;
        let tree = builder.finalize()?;
        Ok(BuiltLayout { tree, fields })
    }
}

fn declare_node(
    builder: &mut Builder,
    parent: NodeHandle,
    node: &NodeManifest,
    names: &mut HashSet<String>,
    fields: &mut Vec<Field>,
) -> LayoutResult<()> {
    let handle = builder.declare_node(parent, &node.axes, &node.extents)?;
    place_fields(builder, handle, &node.fields, names, fields)?;
    for child in &node.children {
        declare_node(builder, handle, child, names, fields)?;
    }
    Ok(())
}

fn place_fields(
    builder: &mut Builder,
    node: NodeHandle,
    manifests: &[FieldManifest],
    names: &mut HashSet<String>,
    fields: &mut Vec<Field>,
) -> LayoutResult<()> {
    if manifests.is_empty() {
        return Ok(());
    }

    let created: Vec<Field> = manifests
        .iter()
        .map(|m| Field::new(m.name.clone(), m.dtype))
        .collect();
    for field in &created {
        if !names.insert(field.name().to_string()) {
            return Err(LayoutError::DoublePlacement {
                field: field.name().to_string(),
            });
        }
    }

    let refs: Vec<&Field> = created.iter().collect();
    builder.place(node, &refs)?;
    fields.extend(created);
    Ok(())
}
