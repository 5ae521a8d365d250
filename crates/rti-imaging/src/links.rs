//! Link numbering
//!
//! Links are ordered (tx, rx) node pairs. For `n` nodes, link ids run over
//! `0..n*(n-1)`: the transmitter is `id / (n-1)` and the receiver enumerates
//! the remaining nodes in ascending order.

use crate::{Result, RtiError};

/// A directed node pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    /// Link id
    pub id: usize,
    /// Transmitting node
    pub tx: usize,
    /// Receiving node
    pub rx: usize,
}

/// Convert a link number to its (tx, rx) node numbers
pub fn tx_rx_for_link(link: usize, nodes: usize) -> Result<(usize, usize)> {
    if nodes < 2 {
        return Err(RtiError::LinkOutOfRange { link, nodes });
    }
    let tx = link / (nodes - 1);
    let mut rx = link % (nodes - 1);
    if rx >= tx {
        rx += 1;
    }
    if tx >= nodes {
        return Err(RtiError::LinkOutOfRange { link, nodes });
    }
    Ok((tx, rx))
}

/// Convert a (tx, rx) node pair back to its link number
pub fn link_for(tx: usize, rx: usize, nodes: usize) -> Result<usize> {
    if tx >= nodes || rx >= nodes || tx == rx {
        return Err(RtiError::InvalidConfig(format!(
            "no link from node {tx} to node {rx} among {nodes} nodes"
        )));
    }
    let offset = if rx > tx { rx - 1 } else { rx };
    Ok(tx * (nodes - 1) + offset)
}

/// Enumerates all links of an `n`-node network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkIndex {
    nodes: usize,
}

impl LinkIndex {
    /// Create an index for `nodes` nodes
    pub fn new(nodes: usize) -> Result<Self> {
        if nodes < 2 {
            return Err(RtiError::InvalidConfig(format!(
                "a link index needs at least 2 nodes, got {nodes}"
            )));
        }
        Ok(Self { nodes })
    }

    /// Node count
    pub fn nodes(&self) -> usize {
        self.nodes
    }

    /// Number of directed links
    pub fn len(&self) -> usize {
        self.nodes * (self.nodes - 1)
    }

    /// Always false for a constructed index
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a single link
    pub fn link(&self, id: usize) -> Result<Link> {
        let (tx, rx) = tx_rx_for_link(id, self.nodes)?;
        Ok(Link { id, tx, rx })
    }

    /// Iterate over every link in id order
    pub fn iter(&self) -> impl Iterator<Item = Link> + '_ {
        let n = self.nodes;
        (0..n).flat_map(move |tx| {
            (0..n)
                .filter(move |&rx| rx != tx)
                .enumerate()
                .map(move |(k, rx)| Link {
                    id: tx * (n - 1) + k,
                    tx,
                    rx,
                })
        })
    }
}
