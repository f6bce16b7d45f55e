use std::fmt;

/// A single value stored in a tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// 16 bit signed integer.
    Short(i16),
    /// 32 bit signed integer.
    Long(i32),
    /// 16 bit unsigned integer.
    UInt16(u16),
    /// 32 bit unsigned integer.
    UInt32(u32),
    /// Single precision float.
    Float(f32),
    /// Double precision float.
    Double(f64),
    /// Boolean flag.
    Boolean(bool),
    /// Text.
    String(String),
    /// Nested group or list.
    Group(TagGroup),
}

impl TagValue {
    /// The DM-script tag type name (`Long`, `String`, `TagGroup`, ...).
    pub fn type_name(&self) -> &'static str {
        match self {
            TagValue::Short(_) => "Short",
            TagValue::Long(_) => "Long",
            TagValue::UInt16(_) => "UInt16",
            TagValue::UInt32(_) => "UInt32",
            TagValue::Float(_) => "Float",
            TagValue::Double(_) => "Double",
            TagValue::Boolean(_) => "Boolean",
            TagValue::String(_) => "String",
            TagValue::Group(group) if group.is_list() => "TagList",
            TagValue::Group(_) => "TagGroup",
        }
    }

    /// Numeric content of integer and float tags.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            TagValue::Short(n) => Some(f64::from(*n)),
            TagValue::Long(n) => Some(f64::from(*n)),
            TagValue::UInt16(n) => Some(f64::from(*n)),
            TagValue::UInt32(n) => Some(f64::from(*n)),
            TagValue::Float(x) => Some(f64::from(*x)),
            TagValue::Double(x) => Some(*x),
            _ => None,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::String(s) => write!(f, "{}({:?})", self.type_name(), s),
            TagValue::Boolean(b) => write!(f, "Boolean({})", u8::from(*b)),
            TagValue::Group(group) => write!(f, "{}[{}]", self.type_name(), group.len()),
            other => match other.as_number() {
                Some(x) => write!(f, "{}({})", other.type_name(), x),
                None => f.write_str(other.type_name()),
            },
        }
    }
}

/// A tag: an optional label and its value.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    /// Label, absent for list entries.
    pub label: Option<String>,
    /// Stored value.
    pub value: TagValue,
}

/// DM-script's structured container.
///
/// One type covers both `TagGroup` (labeled tags) and `TagList` (unlabeled
/// tags addressed by index); `is_list` records which one the script created.
/// Tags keep insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagGroup {
    is_list: bool,
    tags: Vec<Tag>,
}

impl TagGroup {
    /// Create an empty, labeled group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty list.
    pub fn new_list() -> Self {
        Self {
            is_list: true,
            tags: Vec::new(),
        }
    }

    /// Whether this container was created as a list.
    pub fn is_list(&self) -> bool {
        self.is_list
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the container holds no tags.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Append an unlabeled tag.
    pub fn push(&mut self, value: TagValue) {
        self.tags.push(Tag { label: None, value });
    }

    /// Set the tag with `label`, appending it if it does not exist yet.
    pub fn set(&mut self, label: impl Into<String>, value: TagValue) {
        let label = label.into();
        match self.position(&label) {
            Some(index) => self.tags[index].value = value,
            None => self.tags.push(Tag {
                label: Some(label),
                value,
            }),
        }
    }

    /// Append a labeled tag, even if the label exists already. Returns its
    /// index.
    pub fn push_labeled(&mut self, label: impl Into<String>, value: TagValue) -> usize {
        self.tags.push(Tag {
            label: Some(label.into()),
            value,
        });
        self.tags.len() - 1
    }

    /// Insert an unlabeled tag at `index`, appending when `index` is past
    /// the end.
    pub fn insert(&mut self, index: usize, value: TagValue) {
        let index = index.min(self.tags.len());
        self.tags.insert(index, Tag { label: None, value });
    }

    /// Replace the value at `index`, keeping its label. Returns `false` if
    /// there is no such tag.
    pub fn set_index(&mut self, index: usize, value: TagValue) -> bool {
        match self.tags.get_mut(index) {
            Some(tag) => {
                tag.value = value;
                true
            }
            None => false,
        }
    }

    /// Value of the tag with `label`.
    pub fn get(&self, label: &str) -> Option<&TagValue> {
        self.position(label).map(|index| &self.tags[index].value)
    }

    /// Mutable value of the tag with `label`.
    pub fn get_mut(&mut self, label: &str) -> Option<&mut TagValue> {
        self.position(label)
            .map(move |index| &mut self.tags[index].value)
    }

    /// Mutable value of the tag at `index`.
    pub fn get_index_mut(&mut self, index: usize) -> Option<&mut TagValue> {
        self.tags.get_mut(index).map(|tag| &mut tag.value)
    }

    /// Index of the first tag with `label`.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.position(label)
    }

    /// Tag at `index`.
    pub fn get_index(&self, index: usize) -> Option<&Tag> {
        self.tags.get(index)
    }

    /// Remove the tag with `label`.
    pub fn remove(&mut self, label: &str) -> Option<TagValue> {
        self.position(label)
            .map(|index| self.tags.remove(index).value)
    }

    /// Iterate over the tags in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.tags.iter()
    }

    /// Labels of all labeled tags, in insertion order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().filter_map(|tag| tag.label.as_deref())
    }

    fn position(&self, label: &str) -> Option<usize> {
        self.tags
            .iter()
            .position(|tag| tag.label.as_deref() == Some(label))
    }
}

impl<'a> IntoIterator for &'a TagGroup {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
