//! [`NodeId`] – opaque key addressing one entity in the server's address space.
//!
//! The canonical text form is `ns=<index>;i=<number>` for numeric identifiers
//! and `ns=<index>;s=<text>` for string identifiers.  Namespace `0` may omit
//! the `ns=` prefix when parsing.  The mapping table keys its reverse index
//! by this canonical form, so two ids are the same node exactly when their
//! canonical strings are equal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::GatewayError;

/// Identifier part of a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Numeric(u32),
    String(String),
}

/// Address-space node identifier: a namespace index plus an identifier.
///
/// # Example
///
/// ```
/// use pvgate_types::NodeId;
///
/// let id = NodeId::string(2, "obj1.FanSpeed");
/// assert_eq!(id.to_string(), "ns=2;s=obj1.FanSpeed");
/// assert_eq!("ns=2;s=obj1.FanSpeed".parse::<NodeId>().unwrap(), id);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId {
    namespace: u16,
    identifier: Identifier,
}

impl NodeId {
    /// Numeric identifier in namespace `namespace`.
    pub fn numeric(namespace: u16, value: u32) -> Self {
        Self {
            namespace,
            identifier: Identifier::Numeric(value),
        }
    }

    /// String identifier in namespace `namespace`.
    pub fn string(namespace: u16, value: impl Into<String>) -> Self {
        Self {
            namespace,
            identifier: Identifier::String(value.into()),
        }
    }

    /// Namespace index.
    pub fn namespace(&self) -> u16 {
        self.namespace
    }

    /// Identifier within the namespace.
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// The canonical string form used as a lookup key.
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Identifier::Numeric(n) => write!(f, "ns={};i={}", self.namespace, n),
            Identifier::String(s) => write!(f, "ns={};s={}", self.namespace, s),
        }
    }
}

impl FromStr for NodeId {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GatewayError::InvalidNodeId(s.to_string());

        let (namespace, rest) = match s.strip_prefix("ns=") {
            Some(tail) => {
                let (ns, rest) = tail.split_once(';').ok_or_else(invalid)?;
                (ns.parse::<u16>().map_err(|_| invalid())?, rest)
            }
            None => (0, s),
        };

        if let Some(num) = rest.strip_prefix("i=") {
            let value = num.parse::<u32>().map_err(|_| invalid())?;
            Ok(Self::numeric(namespace, value))
        } else if let Some(text) = rest.strip_prefix("s=") {
            if text.is_empty() {
                return Err(invalid());
            }
            Ok(Self::string(namespace, text))
        } else {
            Err(invalid())
        }
    }
}

impl TryFrom<String> for NodeId {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.to_string()
    }
}
