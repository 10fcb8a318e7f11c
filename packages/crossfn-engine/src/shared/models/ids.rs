//! Identifiers for program-model entities
//!
//! All identifiers are plain strings under a newtype so that contract,
//! function and variable names cannot be mixed up at call sites. Function and
//! variable identifiers are qualified by their contract (`Vault.deposit`,
//! `Vault.totalAssets`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Contract identity
    ContractId
);

string_id!(
    /// Function identity, qualified by contract (`Vault.deposit`)
    FunctionId
);

string_id!(
    /// Storage variable identity, qualified by contract (`Vault.totalAssets`)
    VarId
);

impl FunctionId {
    /// Build `contract.name`
    pub fn qualified(contract: &ContractId, name: &str) -> Self {
        Self(format!("{}.{}", contract, name))
    }

    /// Unqualified function name
    pub fn short_name(&self) -> &str {
        self.0.rsplit_once('.').map_or(&self.0, |(_, name)| name)
    }
}

impl VarId {
    /// Build `contract.name`
    pub fn qualified(contract: &ContractId, name: &str) -> Self {
        Self(format!("{}.{}", contract, name))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Operation paths
// ═══════════════════════════════════════════════════════════════════════════

/// Branch arm selector inside an [`OpPath`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arm {
    Then,
    Else,
}

impl Arm {
    fn as_str(self) -> &'static str {
        match self {
            Arm::Then => "then",
            Arm::Else => "else",
        }
    }
}

/// Position of an operation inside a function body.
///
/// Top-level operations are addressed by their index (`3`); operations nested
/// in a branch are addressed through the branch index and arm
/// (`3.then.1`, `3.else.0.then.2`). Serialized as that dotted string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OpPath {
    prefix: Vec<(u32, Arm)>,
    index: u32,
}

impl OpPath {
    /// Path of a top-level operation
    pub fn root(index: u32) -> Self {
        Self {
            prefix: Vec::new(),
            index,
        }
    }

    /// Path of operation `index` inside arm `arm` of the branch at `self`
    pub fn child(&self, arm: Arm, index: u32) -> Self {
        let mut prefix = self.prefix.clone();
        prefix.push((self.index, arm));
        Self { prefix, index }
    }

    /// Index within the innermost operation list
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Nesting depth (0 for top-level operations)
    pub fn depth(&self) -> usize {
        self.prefix.len()
    }

    // A branch sorts before the operations nested in it, which sort before
    // the branch's successor.
    fn sort_key(&self) -> Vec<(u32, u8)> {
        let mut key: Vec<(u32, u8)> = self
            .prefix
            .iter()
            .map(|(index, arm)| (*index, if *arm == Arm::Then { 1 } else { 2 }))
            .collect();
        key.push((self.index, 0));
        key
    }
}

impl PartialOrd for OpPath {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpPath {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for OpPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, arm) in &self.prefix {
            write!(f, "{}.{}.", index, arm.as_str())?;
        }
        write!(f, "{}", self.index)
    }
}

impl FromStr for OpPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() % 2 == 0 {
            return Err(format!("malformed operation path '{}'", s));
        }

        let parse_index = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| format!("malformed operation path '{}': '{}' is not an index", s, part))
        };

        let mut prefix = Vec::with_capacity(parts.len() / 2);
        for pair in parts[..parts.len() - 1].chunks(2) {
            let arm = match pair[1] {
                "then" => Arm::Then,
                "else" => Arm::Else,
                other => {
                    return Err(format!(
                        "malformed operation path '{}': unknown arm '{}'",
                        s, other
                    ))
                }
            };
            prefix.push((parse_index(pair[0])?, arm));
        }

        Ok(Self {
            prefix,
            index: parse_index(parts[parts.len() - 1])?,
        })
    }
}

impl TryFrom<String> for OpPath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OpPath> for String {
    fn from(value: OpPath) -> Self {
        value.to_string()
    }
}

/// Reference to one operation of one function
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpRef {
    pub function: FunctionId,
    pub op: OpPath,
}

impl OpRef {
    pub fn new(function: FunctionId, op: OpPath) -> Self {
        Self { function, op }
    }
}

impl fmt::Display for OpRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.function, self.op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_path_display_and_parse() {
        let path = OpPath::root(3).child(Arm::Else, 0).child(Arm::Then, 2);
        assert_eq!(path.to_string(), "3.else.0.then.2");
        assert_eq!("3.else.0.then.2".parse::<OpPath>().unwrap(), path);
        assert_eq!("7".parse::<OpPath>().unwrap(), OpPath::root(7));
    }

    #[test]
    fn test_op_path_rejects_garbage() {
        assert!("3.then".parse::<OpPath>().is_err());
        assert!("3.maybe.1".parse::<OpPath>().is_err());
        assert!("x".parse::<OpPath>().is_err());
    }

    #[test]
    fn test_op_path_ordering_follows_program_order() {
        let a = OpPath::root(1);
        let b = OpPath::root(1).child(Arm::Then, 0);
        let c = OpPath::root(2);
        assert!(a < c);
        assert!(b < c);
    }

    #[test]
    fn test_function_short_name() {
        let id = FunctionId::qualified(&ContractId::new("Vault"), "deposit");
        assert_eq!(id.as_str(), "Vault.deposit");
        assert_eq!(id.short_name(), "deposit");
    }
}
