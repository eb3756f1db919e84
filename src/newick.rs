//! Newick topology parsing and printing
//!
//! Branch lengths are accepted and ignored: the engine only needs the shape
//! of the tree. Labels are bare (`Homo_sapiens`) or single-quoted.

use crate::error::{PhyloError, Result};
use crate::tree::{NodeId, Tree};
use nom::{
    branch::alt,
    bytes::complete::{is_not, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, opt},
    multi::separated_list1,
    number::complete::double,
    sequence::{delimited, preceded, terminated},
    IResult,
};

/// Parsed tree shape, leaves named after dataset organisms
#[derive(Debug, Clone, PartialEq)]
pub enum Topology {
    Leaf(String),
    Internal {
        label: Option<String>,
        children: Vec<Topology>,
    },
}

impl Topology {
    pub fn leaf_names(&self) -> Vec<&str> {
        match self {
            Topology::Leaf(name) => vec![name.as_str()],
            Topology::Internal { children, .. } => {
                children.iter().flat_map(Topology::leaf_names).collect()
            }
        }
    }
}

fn is_label_char(c: char) -> bool {
    !c.is_whitespace() && !"(),:;[]'".contains(c)
}

fn bare_label(input: &str) -> IResult<&str, String> {
    map(take_while1(is_label_char), str::to_string)(input)
}

fn quoted_label(input: &str) -> IResult<&str, String> {
    map(
        delimited(char('\''), opt(is_not("'")), char('\'')),
        |s: Option<&str>| s.unwrap_or_default().to_string(),
    )(input)
}

fn label(input: &str) -> IResult<&str, String> {
    alt((quoted_label, bare_label))(input)
}

fn branch_length(input: &str) -> IResult<&str, f64> {
    preceded(delimited(multispace0, char(':'), multispace0), double)(input)
}

fn internal(input: &str) -> IResult<&str, Topology> {
    let (input, children) =
        delimited(char('('), separated_list1(char(','), subtree), char(')'))(input)?;
    let (input, label) = opt(preceded(multispace0, label))(input)?;
    Ok((input, Topology::Internal { label, children }))
}

fn subtree(input: &str) -> IResult<&str, Topology> {
    let (input, _) = multispace0(input)?;
    let (input, node) = alt((internal, map(label, Topology::Leaf)))(input)?;
    let (input, _) = opt(branch_length)(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, node))
}

/// Parse a single Newick tree terminated by `;`
pub fn parse_newick(text: &str) -> Result<Topology> {
    let mut parser = all_consuming(terminated(
        terminated(subtree, char(';')),
        multispace0,
    ));
    parser(text)
        .map(|(_, topology)| topology)
        .map_err(|e| PhyloError::Format(format!("invalid Newick topology: {e}")))
}

fn format_label(name: &str) -> String {
    if !name.is_empty() && name.chars().all(is_label_char) {
        name.to_string()
    } else {
        format!("'{name}'")
    }
}

/// Print the tree from its starting node. Internal nodes carry their names
/// when `label_internal` is set.
pub fn write_newick(tree: &Tree, label_internal: bool) -> String {
    let mut out = String::new();
    write_subtree(tree, tree.start(), None, label_internal, &mut out);
    out.push(';');
    out
}

fn write_subtree(
    tree: &Tree,
    node: NodeId,
    parent: Option<NodeId>,
    label_internal: bool,
    out: &mut String,
) {
    let children = tree.children(node, parent);
    if children.is_empty() {
        out.push_str(&format_label(tree.node(node).name()));
        return;
    }
    out.push('(');
    for (i, &child) in children.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_subtree(tree, child, Some(node), label_internal, out);
    }
    out.push(')');
    if label_internal {
        out.push_str(&format_label(tree.node(node).name()));
    }
}
