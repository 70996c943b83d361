//! Hierarchical memory layouts for multi-dimensional fields.
//!
//! Layouts are declared as a tree of dense blocks over named axes. Fields
//! placed on the same block are interleaved (AoS), fields on different
//! blocks are stored apart (SoA), and nesting the same axes twice gives a
//! tiled layout. Finalizing a [`Builder`] computes a closed-form address
//! function for every field and allocates one backing buffer; the logical
//! indexing of a field never depends on how it is laid out.
//!
//! ```
//! use field_layout::{Axis, Builder, Field, PaddingPolicy};
//!
//! let mut builder = Builder::with_padding(PaddingPolicy::Packed);
//! let rows = builder.declare_node(builder.root(), &[Axis::I], &[4])?;
//! let cols = builder.declare_node(rows, &[Axis::J], &[3])?;
//!
//! let x = Field::of::<f32>("x");
//! builder.place(cols, &[&x])?;
//! let tree = builder.finalize()?;
//!
//! x.set(&[2, 1], 7.5f32)?;
//! assert_eq!(x.get::<f32>(&[2, 1])?, 7.5);
//! assert_eq!(tree.resolve(&x, &[2, 1])?, (2 * 3 + 1) * 4);
//! # Ok::<(), field_layout::LayoutError>(())
//! ```

pub mod axis;
pub mod builder;
pub mod config;
pub mod constants;
pub mod dtype;
pub mod error;
pub mod field;
pub mod global;
pub mod manifest;
pub mod padding;
pub mod tree;

pub use axis::{Axis, AxisExtent};
pub use builder::{Builder, NodeHandle};
pub use config::LayoutConfig;
pub use dtype::{DataType, Element};
pub use error::{LayoutError, LayoutResult};
pub use field::Field;
pub use manifest::{BuiltLayout, LayoutManifest};
pub use padding::{padding_policy, set_padding_policy, PaddingPolicy};
pub use tree::{AddressFn, LayoutNode, LayoutTree, TreeStats};
