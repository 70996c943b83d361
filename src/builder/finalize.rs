//! Extent computation and address-function derivation
//!
//! Sizes are computed bottom-up over the arena (children always have larger
//! indices than their parent), offsets top-down, and then one address
//! function is derived per placed field from its root-to-leaf path.

use crate::axis::Axis;
use crate::constants::axes::MAX_AXES;
use crate::error::{CheckedSize, LayoutError, LayoutResult};
use crate::padding::PaddingPolicy;
use crate::tree::{AddressFn, AxisTerm, FieldSlot, LayoutNode, TreePlan};

use super::NodeDecl;

pub(super) fn plan(decls: &[NodeDecl], padding: PaddingPolicy) -> LayoutResult<TreePlan> {
    let nodes = size_nodes(decls, padding)?;
    let slots = derive_slots(decls, &nodes)?;
    let total_size = nodes[0].container_size;

    Ok(TreePlan {
        nodes,
        slots,
        total_size,
    })
}

fn size_nodes(decls: &[NodeDecl], padding: PaddingPolicy) -> LayoutResult<Vec<LayoutNode>> {
    let mut nodes: Vec<LayoutNode> = decls
        .iter()
        .enumerate()
        .map(|(index, decl)| -> LayoutResult<LayoutNode> {
            let padded = decl
                .block
                .iter()
                .map(|b| padding.padded_extent(b.extent))
                .collect::<LayoutResult<Vec<_>>>()?;
            Ok(LayoutNode {
                index,
                parent: decl.parent,
                children: decl.children.clone(),
                block: decl.block.clone(),
                padded,
                field_bytes: 0,
                cell_size: 0,
                container_size: 0,
                base_offset: 0,
                depth: 0,
            })
        })
        .collect::<LayoutResult<_>>()?;

    for index in (0..decls.len()).rev() {
        let decl = &decls[index];
        let field_bytes = decl
            .fields
            .iter()
            .try_fold(0usize, |acc, field| acc.add_size(field.element_size(), "cell size"))?;

        let mut cell_size = field_bytes;
        for &child in &decl.children {
            cell_size = cell_size.add_size(nodes[child].container_size, "cell size")?;
        }

        let cells = nodes[index]
            .padded
            .iter()
            .try_fold(1usize, |acc, &extent| acc.mul_size(extent, "block size"))?;

        if decl.fields.is_empty() && decl.children.is_empty() && index != 0 {
            log::warn!("[Builder] Node {} has neither fields nor children", index);
        }

        let node = &mut nodes[index];
        node.field_bytes = field_bytes;
        node.cell_size = cell_size;
        node.container_size = cells.mul_size(cell_size, "block size")?;
    }

    for index in 0..decls.len() {
        let mut cursor = nodes[index].field_bytes;
        let depth = nodes[index].depth;
        for &child in &decls[index].children {
            nodes[child].base_offset = cursor;
            nodes[child].depth = depth + 1;
            cursor += nodes[child].container_size;
        }
    }

    Ok(nodes)
}

/// Root-to-node chain of arena indices
fn path_to(nodes: &[LayoutNode], leaf: usize) -> Vec<usize> {
    let mut path = vec![leaf];
    let mut current = leaf;
    while let Some(parent) = nodes[current].parent {
        path.push(parent);
        current = parent;
    }
    path.reverse();
    path
}

/// Preorder traversal, children in declaration order
fn preorder(nodes: &[LayoutNode]) -> Vec<usize> {
    let mut order = Vec::with_capacity(nodes.len());
    let mut stack = vec![0usize];
    while let Some(index) = stack.pop() {
        order.push(index);
        stack.extend(nodes[index].children.iter().rev());
    }
    order
}

struct PathAddress {
    axes: Vec<Axis>,
    shape: Vec<usize>,
    constant: usize,
    terms: Vec<AxisTerm>,
}

fn derive_path(nodes: &[LayoutNode], path: &[usize]) -> LayoutResult<PathAddress> {
    // Total declared extent per axis along the path
    let mut totals: [Option<usize>; MAX_AXES] = [None; MAX_AXES];
    for &index in path {
        for b in &nodes[index].block {
            let slot = &mut totals[b.axis.index()];
            *slot = Some(slot.unwrap_or(1).mul_size(b.extent, "field extent")?);
        }
    }

    let axes: Vec<Axis> = Axis::all().filter(|axis| totals[axis.index()].is_some()).collect();
    let shape: Vec<usize> = axes.iter().filter_map(|axis| totals[axis.index()]).collect();
    let mut coord_of = [usize::MAX; MAX_AXES];
    for (coord, axis) in axes.iter().enumerate() {
        coord_of[axis.index()] = coord;
    }

    // Walk innermost-first so `inner` holds the product of deeper extents
    let mut inner = [1usize; MAX_AXES];
    let mut terms = Vec::new();
    let mut constant = 0usize;
    for &index in path.iter().rev() {
        let node = &nodes[index];
        constant = constant.add_size(node.base_offset, "base offset")?;

        let mut cell_stride = 1usize;
        let mut level_terms = Vec::with_capacity(node.block.len());
        for (b, &padded) in node.block.iter().zip(&node.padded).rev() {
            let byte_stride = cell_stride.mul_size(node.cell_size, "stride")?;
            level_terms.push(AxisTerm::new(
                coord_of[b.axis.index()],
                index,
                inner[b.axis.index()],
                b.extent,
                byte_stride,
            ));
            cell_stride = cell_stride.mul_size(padded, "stride")?;
        }
        for b in &node.block {
            inner[b.axis.index()] = inner[b.axis.index()].mul_size(b.extent, "field extent")?;
        }

        level_terms.reverse();
        terms.splice(0..0, level_terms);
    }

    Ok(PathAddress {
        axes,
        shape,
        constant,
        terms,
    })
}

fn derive_slots(decls: &[NodeDecl], nodes: &[LayoutNode]) -> LayoutResult<Vec<FieldSlot>> {
    // First field seen on each axis fixes the tree-wide extent of that axis
    let mut expected: [Option<usize>; MAX_AXES] = [None; MAX_AXES];
    let mut slots = Vec::new();

    for index in preorder(nodes) {
        let fields = &decls[index].fields;
        if fields.is_empty() {
            continue;
        }

        let path = path_to(nodes, index);
        let address = derive_path(nodes, &path)?;

        for (&axis, &extent) in address.axes.iter().zip(&address.shape) {
            match expected[axis.index()] {
                Some(want) if want != extent => {
                    return Err(LayoutError::StructuralMismatch {
                        axis,
                        field: fields[0].name().to_string(),
                        expected: want,
                        found: extent,
                    });
                }
                Some(_) => {}
                None => expected[axis.index()] = Some(extent),
            }
        }

        let mut sub_offset = 0usize;
        for field in fields {
            slots.push(FieldSlot {
                field: field.clone(),
                leaf: index,
                sub_offset,
                address: AddressFn::new(
                    address.axes.clone(),
                    address.shape.clone(),
                    address.constant + sub_offset,
                    address.terms.clone(),
                    field.element_size(),
                ),
            });
            sub_offset += field.element_size();
        }
    }

    Ok(slots)
}
