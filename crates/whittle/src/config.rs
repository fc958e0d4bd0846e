/// Runtime type tags whose values Python treats as immutable.
///
/// Assigning one bare name to another only establishes an alias when the
/// assigned value's type is *not* in this set.
const IMMUTABLE_TYPES: &[&str] = &["int", "float", "complex", "bool", "str", "bytes", "tuple", "frozenset"];

/// Method names that mutate their receiver in place when called on a
/// collection. Reading one of these attributes advances the receiver's
/// active definition.
const COLLECTION_MUTATORS: &[&str] = &["append", "extend", "insert", "remove", "pop", "clear", "reverse", "sort"];

/// Constants governing a slicing session.
///
/// The defaults reproduce the conventional setup: slice the function named
/// `slice_me` at the line carrying a `slicing criterion` comment, and emit
/// `sliced.py` next to inputs with the `.orig` extension.
#[derive(Debug, Clone)]
pub struct SliceConfig {
    /// Name of the function whose body is sliced.
    pub target_function: String,
    /// Substring that marks the criterion comment.
    pub criterion_marker: String,
    /// Conventional name of the implicit method receiver; writes through it
    /// are ignored.
    pub self_name: String,
    /// Input-only file extension. Sources carrying it get a sliced sibling
    /// file; any other extension produces no file.
    pub original_extension: String,
    /// File name of the emitted slice.
    pub sliced_file_name: String,
    /// Type tags exempt from alias tracking.
    pub immutable_types: Vec<String>,
    /// Attribute names treated as in-place collection mutators.
    pub collection_mutators: Vec<String>,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            target_function: "slice_me".to_owned(),
            criterion_marker: "slicing criterion".to_owned(),
            self_name: "self".to_owned(),
            original_extension: "orig".to_owned(),
            sliced_file_name: "sliced.py".to_owned(),
            immutable_types: IMMUTABLE_TYPES.iter().map(|s| (*s).to_owned()).collect(),
            collection_mutators: COLLECTION_MUTATORS.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

impl SliceConfig {
    /// Whether a runtime type tag names an immutable type.
    #[must_use]
    pub fn is_immutable(&self, type_tag: &str) -> bool {
        self.immutable_types.iter().any(|t| t == type_tag)
    }

    /// Whether an attribute name is an in-place collection mutator.
    #[must_use]
    pub fn is_collection_mutator(&self, attr: &str) -> bool {
        self.collection_mutators.iter().any(|a| a == attr)
    }
}
