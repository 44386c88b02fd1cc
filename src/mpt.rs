//! Merkle-Patricia-Trie proof decoding.
//!
//! A proof is a path of trie nodes from the root toward a key. Each
//! node arrives RLP-encoded as a list of 2 items (leaf or extension,
//! distinguished by the hex-prefix flag on the path) or 17 items (a
//! branch: 16 child references plus an optional value). This module
//! decodes that wire shape into typed nodes; verifying a decoded path
//! against a state root is out of scope here.

use alloy_primitives::B256;
use alloy_rlp::Header;

#[derive(thiserror::Error, Debug)]
pub enum MptError {
    #[error("rlp decoding failed: {0}")]
    Rlp(#[from] alloy_rlp::Error),
    #[error("proof node is not an rlp list")]
    NotAList,
    #[error("proof node must hold 2 or 17 items, got {0}")]
    InvalidNodeShape(usize),
    #[error("invalid hex-prefix flag nibble {0:#x}")]
    InvalidPathFlag(u8),
    #[error("empty hex-prefix path encoding")]
    EmptyPath,
    #[error("invalid child reference in proof node")]
    InvalidChildReference,
}

/// A key fragment as stored in a leaf or extension node: the decoded
/// nibbles plus the leaf/extension discriminant carried by the
/// hex-prefix flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NibblePath {
    pub nibbles: Vec<u8>,
    pub is_leaf: bool,
}

impl NibblePath {
    /// Decode the hex-prefix ("compact") encoding: the high nibble of
    /// the first byte carries the leaf flag and the odd-length flag,
    /// the low nibble is the first path nibble when the length is odd.
    pub fn decode_compact(encoded: &[u8]) -> Result<Self, MptError> {
        let first = *encoded.first().ok_or(MptError::EmptyPath)?;
        let flag = first >> 4;
        let is_leaf = match flag {
            0 | 1 => false,
            2 | 3 => true,
            other => return Err(MptError::InvalidPathFlag(other)),
        };
        let mut nibbles = Vec::with_capacity(encoded.len() * 2);
        if flag & 1 == 1 {
            nibbles.push(first & 0x0f);
        }
        for byte in &encoded[1..] {
            nibbles.push(byte >> 4);
            nibbles.push(byte & 0x0f);
        }
        Ok(NibblePath { nibbles, is_leaf })
    }
}

/// A reference from a node to a child: the keccak hash of the child's
/// encoding, or the child's raw encoding inlined when it is shorter
/// than a hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MptReference {
    Hash(B256),
    Inline(Vec<u8>),
}

/// One decoded proof node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MptNode {
    Leaf {
        path: NibblePath,
        value: Vec<u8>,
    },
    Extension {
        path: NibblePath,
        child: MptReference,
    },
    Branch {
        children: Box<[Option<MptReference>; 16]>,
        value: Option<Vec<u8>>,
    },
}

/// The decoded nodes of one proof, root first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MptNodePath {
    pub nodes: Vec<MptNode>,
}

impl MptNodePath {
    /// Decode a proof: an RLP list whose items are proof nodes, either
    /// as nested lists or as byte strings wrapping a node's encoding.
    pub fn decode(buf: &[u8]) -> Result<Self, MptError> {
        let mut nodes = Vec::new();
        for item in decode_list_items(buf)? {
            let node = match item {
                Item::List(raw) => decode_node(&raw)?,
                Item::Str(bytes) => decode_node(&bytes)?,
            };
            nodes.push(node);
        }
        Ok(MptNodePath { nodes })
    }
}

/// Decode an RLP list of proofs.
pub fn decode_proof_list(buf: &[u8]) -> Result<Vec<MptNodePath>, MptError> {
    let mut proofs = Vec::new();
    for item in decode_list_items(buf)? {
        let proof = match item {
            Item::List(raw) => MptNodePath::decode(&raw)?,
            Item::Str(bytes) => MptNodePath::decode(&bytes)?,
        };
        proofs.push(proof);
    }
    Ok(proofs)
}

/// Decode one proof node from its RLP encoding.
pub fn decode_node(buf: &[u8]) -> Result<MptNode, MptError> {
    let items = decode_list_items(buf)?;
    match items.len() {
        2 => {
            let Item::Str(encoded_path) = &items[0] else {
                return Err(MptError::InvalidNodeShape(2));
            };
            let path = NibblePath::decode_compact(encoded_path)?;
            if path.is_leaf {
                let Item::Str(value) = &items[1] else {
                    return Err(MptError::InvalidNodeShape(2));
                };
                Ok(MptNode::Leaf {
                    path,
                    value: value.clone(),
                })
            } else {
                let child = child_reference(&items[1])?
                    .ok_or(MptError::InvalidChildReference)?;
                Ok(MptNode::Extension { path, child })
            }
        }
        17 => {
            let mut children: [Option<MptReference>; 16] = Default::default();
            for (slot, item) in children.iter_mut().zip(&items[..16]) {
                *slot = child_reference(item)?;
            }
            let value = match &items[16] {
                Item::Str(bytes) if bytes.is_empty() => None,
                Item::Str(bytes) => Some(bytes.clone()),
                Item::List(_) => return Err(MptError::InvalidNodeShape(17)),
            };
            Ok(MptNode::Branch {
                children: Box::new(children),
                value,
            })
        }
        other => Err(MptError::InvalidNodeShape(other)),
    }
}

fn child_reference(item: &Item) -> Result<Option<MptReference>, MptError> {
    match item {
        Item::Str(bytes) if bytes.is_empty() => Ok(None),
        Item::Str(bytes) if bytes.len() == 32 => {
            Ok(Some(MptReference::Hash(B256::from_slice(bytes))))
        }
        Item::Str(_) => Err(MptError::InvalidChildReference),
        Item::List(raw) => Ok(Some(MptReference::Inline(raw.clone()))),
    }
}

/// One raw item of an RLP list: a byte string, or a nested list kept
/// as its full encoding (header included).
enum Item {
    Str(Vec<u8>),
    List(Vec<u8>),
}

/// Decode the items of a top-level RLP list.
fn decode_list_items(mut buf: &[u8]) -> Result<Vec<Item>, MptError> {
    let header = Header::decode(&mut buf)?;
    if !header.list {
        return Err(MptError::NotAList);
    }
    let mut payload = &buf[..header.payload_length];
    let mut items = Vec::new();
    while !payload.is_empty() {
        let before = payload;
        let mut probe = payload;
        let item_header = Header::decode(&mut probe)?;
        let header_len = before.len() - probe.len();
        let total = header_len + item_header.payload_length;
        if item_header.list {
            items.push(Item::List(before[..total].to_vec()));
        } else {
            items.push(Item::Str(probe[..item_header.payload_length].to_vec()));
        }
        payload = &payload[total..];
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bytes;
    use alloy_rlp::Encodable;

    /// RLP list of byte strings, built the same way the wire builds
    /// trie nodes.
    fn rlp_list(items: &[&[u8]]) -> Vec<u8> {
        let encoded: Vec<Bytes> = items.iter().map(|i| Bytes::copy_from_slice(i)).collect();
        let payload_length: usize = encoded.iter().map(|i| i.length()).sum();
        let mut out = Vec::new();
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        for item in &encoded {
            item.encode(&mut out);
        }
        out
    }

    /// RLP list whose items are pre-encoded (nested lists pass through
    /// verbatim).
    fn rlp_list_raw(items: &[Vec<u8>]) -> Vec<u8> {
        let payload_length: usize = items.iter().map(|i| i.len()).sum();
        let mut out = Vec::new();
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        for item in items {
            out.extend_from_slice(item);
        }
        out
    }

    #[test]
    fn compact_decoding_covers_all_flags() {
        // Even extension: 0x00 prefix byte.
        let path = NibblePath::decode_compact(&[0x00, 0xab]).unwrap();
        assert_eq!((path.nibbles.as_slice(), path.is_leaf), (&[0xa, 0xb][..], false));

        // Odd extension: flag 1 carries the first nibble.
        let path = NibblePath::decode_compact(&[0x1a, 0xbc]).unwrap();
        assert_eq!((path.nibbles.as_slice(), path.is_leaf), (&[0xa, 0xb, 0xc][..], false));

        // Even leaf.
        let path = NibblePath::decode_compact(&[0x20, 0xab]).unwrap();
        assert_eq!((path.nibbles.as_slice(), path.is_leaf), (&[0xa, 0xb][..], true));

        // Odd leaf.
        let path = NibblePath::decode_compact(&[0x35]).unwrap();
        assert_eq!((path.nibbles.as_slice(), path.is_leaf), (&[0x5][..], true));

        assert!(matches!(
            NibblePath::decode_compact(&[0x45]),
            Err(MptError::InvalidPathFlag(4))
        ));
        assert!(matches!(
            NibblePath::decode_compact(&[]),
            Err(MptError::EmptyPath)
        ));
    }

    #[test]
    fn leaf_node_decodes() {
        let node = rlp_list(&[&[0x35], b"hello"]);
        match decode_node(&node).unwrap() {
            MptNode::Leaf { path, value } => {
                assert_eq!(path.nibbles, vec![0x5]);
                assert!(path.is_leaf);
                assert_eq!(value, b"hello");
            }
            other => panic!("expected leaf, got {other:?}"),
        }
    }

    #[test]
    fn extension_node_decodes_with_hash_child() {
        let child = [0x42u8; 32];
        let node = rlp_list(&[&[0x00, 0xab], &child]);
        match decode_node(&node).unwrap() {
            MptNode::Extension { path, child } => {
                assert_eq!(path.nibbles, vec![0xa, 0xb]);
                assert_eq!(child, MptReference::Hash(B256::repeat_byte(0x42)));
            }
            other => panic!("expected extension, got {other:?}"),
        }
    }

    #[test]
    fn branch_node_decodes_children_and_value() {
        let hash = [0x11u8; 32];
        let mut items: Vec<&[u8]> = vec![&[]; 17];
        items[3] = &hash;
        items[16] = b"value";
        let node = rlp_list(&items);
        match decode_node(&node).unwrap() {
            MptNode::Branch { children, value } => {
                assert_eq!(children[3], Some(MptReference::Hash(B256::repeat_byte(0x11))));
                assert!(children.iter().enumerate().all(|(i, c)| i == 3 || c.is_none()));
                assert_eq!(value, Some(b"value".to_vec()));
            }
            other => panic!("expected branch, got {other:?}"),
        }
    }

    #[test]
    fn inline_child_is_kept_verbatim() {
        let inline = rlp_list(&[&[0x35], b"v"]);
        let mut items: Vec<Vec<u8>> = Vec::new();
        // Extension whose child is an embedded node list.
        let mut path_item = Vec::new();
        Bytes::copy_from_slice(&[0x00, 0xab]).encode(&mut path_item);
        items.push(path_item);
        items.push(inline.clone());
        let node = rlp_list_raw(&items);

        match decode_node(&node).unwrap() {
            MptNode::Extension { child, .. } => {
                assert_eq!(child, MptReference::Inline(inline));
            }
            other => panic!("expected extension, got {other:?}"),
        }
    }

    #[test]
    fn proof_path_decodes_node_sequence() {
        let branch: Vec<&[u8]> = vec![&[]; 17];
        let branch = rlp_list(&branch);
        let leaf = rlp_list(&[&[0x20, 0xab], b"account"]);
        let proof = rlp_list_raw(&[branch, leaf]);

        let path = MptNodePath::decode(&proof).unwrap();
        assert_eq!(path.nodes.len(), 2);
        assert!(matches!(path.nodes[0], MptNode::Branch { .. }));
        assert!(matches!(path.nodes[1], MptNode::Leaf { .. }));
    }

    #[test]
    fn empty_proof_list_decodes_empty() {
        let empty = rlp_list_raw(&[]);
        assert!(MptNodePath::decode(&empty).unwrap().nodes.is_empty());
        assert!(decode_proof_list(&empty).unwrap().is_empty());
    }

    #[test]
    fn non_list_input_is_rejected() {
        let mut string_item = Vec::new();
        Bytes::copy_from_slice(b"not a node").encode(&mut string_item);
        assert!(matches!(
            MptNodePath::decode(&string_item),
            Err(MptError::NotAList)
        ));
    }

    #[test]
    fn wrong_item_count_is_rejected() {
        let node = rlp_list(&[&[0x35], b"a", b"b"]);
        assert!(matches!(
            decode_node(&node),
            Err(MptError::InvalidNodeShape(3))
        ));
    }
}
