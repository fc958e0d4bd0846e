use ahash::AHashMap;
use indexmap::IndexMap;

/// State of a single indexed slot of a container variable.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ElementRecord {
    pub active_def: u32,
    pub previous_def: Option<u32>,
}

impl ElementRecord {
    #[must_use]
    pub fn new(line: u32) -> Self {
        Self {
            active_def: line,
            previous_def: None,
        }
    }
}

/// State of a single attribute on an object variable.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AttributeRecord {
    pub active_def: u32,
    pub previous_def: Option<u32>,
}

impl AttributeRecord {
    #[must_use]
    pub fn new(line: u32) -> Self {
        Self {
            active_def: line,
            previous_def: None,
        }
    }
}

/// Write-state of one named variable.
///
/// `active_def` is the line of the most recent write or mutating method
/// call, `previous_def` the one before that. Element and attribute tables
/// track per-key sub-definitions; `aliases` lists the peers this variable
/// shares a mutable value with.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VariableRecord {
    pub active_def: u32,
    pub previous_def: Option<u32>,
    pub elements: IndexMap<String, ElementRecord>,
    pub attributes: IndexMap<String, AttributeRecord>,
    /// Runtime type tag observed when the variable was first created.
    pub type_tag: Option<String>,
    pub aliases: Vec<String>,
}

impl VariableRecord {
    fn new(line: u32, type_tag: Option<&str>) -> Self {
        Self {
            active_def: line,
            previous_def: None,
            elements: IndexMap::new(),
            attributes: IndexMap::new(),
            type_tag: type_tag.map(str::to_owned),
            aliases: Vec::new(),
        }
    }

    /// Moves the current definition into `previous_def` and installs `line`
    /// as the active one.
    pub fn advance(&mut self, line: u32) {
        self.previous_def = Some(self.active_def);
        self.active_def = line;
    }
}

/// The per-session definition table: every in-scope variable name mapped to
/// its current write-state.
#[derive(Debug, Default)]
pub struct DefTable {
    variables: AHashMap<String, VariableRecord>,
}

impl DefTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&VariableRecord> {
        self.variables.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut VariableRecord> {
        self.variables.get_mut(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Creates a fresh record for a name with no prior definition.
    pub fn insert_new(&mut self, name: &str, line: u32, type_tag: Option<&str>) {
        self.variables.insert(name.to_owned(), VariableRecord::new(line, type_tag));
    }

    /// Full reassignment of a bare name.
    ///
    /// An existing record advances its definition and drops all per-key
    /// state; its alias links are dissolved on both sides. A new name gets a
    /// fresh record carrying the observed type tag.
    pub fn reassign(&mut self, name: &str, line: u32, type_tag: Option<&str>) {
        let peers = if let Some(record) = self.variables.get_mut(name) {
            record.advance(line);
            record.elements.clear();
            record.attributes.clear();
            std::mem::take(&mut record.aliases)
        } else {
            self.insert_new(name, line, type_tag);
            Vec::new()
        };
        for peer in peers {
            if let Some(peer_record) = self.variables.get_mut(&peer) {
                peer_record.aliases.retain(|n| n != name);
            }
        }
    }

    /// Establishes the symmetric alias link `a ↔ b`.
    ///
    /// Both records must already exist; linking a name to itself is a no-op.
    pub fn alias(&mut self, a: &str, b: &str) {
        if a == b {
            return;
        }
        if let Some(record) = self.variables.get_mut(a) {
            if !record.aliases.iter().any(|n| n == b) {
                record.aliases.push(b.to_owned());
            }
        }
        if let Some(record) = self.variables.get_mut(b) {
            if !record.aliases.iter().any(|n| n == a) {
                record.aliases.push(a.to_owned());
            }
        }
    }

    /// Iterates all tracked variables in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariableRecord)> {
        self.variables.iter().map(|(name, record)| (name.as_str(), record))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
