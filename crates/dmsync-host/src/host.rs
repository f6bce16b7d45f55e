use dmsync_runtime::{TagGroup, TagValue};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared handle to a tag group; script variables of type `TagGroup` alias.
pub(crate) type GroupRef = Arc<Mutex<TagGroup>>;

/// A script value.
#[derive(Debug, Clone)]
pub(crate) enum Val {
    Num(f64),
    Str(String),
    Group(GroupRef),
    /// Declared `TagGroup` that was never assigned.
    Invalid,
}

impl Val {
    pub(crate) fn bool(b: bool) -> Self {
        Val::Num(if b { 1.0 } else { 0.0 })
    }

    pub(crate) fn group(group: TagGroup) -> Self {
        Val::Group(Arc::new(Mutex::new(group)))
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Val::Num(_) => "number",
            Val::Str(_) => "string",
            Val::Group(_) | Val::Invalid => "TagGroup",
        }
    }

    fn num(&self, what: &str) -> Result<f64, String> {
        match self {
            Val::Num(x) => Ok(*x),
            other => Err(format!("{what} must be a number, got {}", other.type_name())),
        }
    }

    fn text(&self, what: &str) -> Result<String, String> {
        match self {
            Val::Str(s) => Ok(s.clone()),
            Val::Num(x) => Ok(format_number(*x)),
            other => Err(format!("{what} must be a string, got {}", other.type_name())),
        }
    }

    fn group_ref(&self) -> Result<&GroupRef, String> {
        match self {
            Val::Group(group) => Ok(group),
            Val::Invalid => Err("tag group is not valid".into()),
            other => Err(format!("expected a TagGroup, got {}", other.type_name())),
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Num(x) => f.write_str(&format_number(*x)),
            Val::Str(s) => f.write_str(s),
            Val::Group(group) => write!(f, "TagGroup[{}]", lock(group).len()),
            Val::Invalid => f.write_str("TagGroup[invalid]"),
        }
    }
}

/// Integral numbers print without decimals.
pub(crate) fn format_number(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{x}")
    }
}

pub(crate) fn lock(group: &GroupRef) -> MutexGuard<'_, TagGroup> {
    group.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the host and running scripts.
#[derive(Debug, Default)]
pub(crate) struct HostState {
    /// The persistent global tags.
    pub(crate) persistent: GroupRef,
    /// Text written with `Result()`.
    pub(crate) output: Mutex<String>,
}

impl HostState {
    /// Lock the persistent tags.
    pub(crate) fn persistent(&self) -> MutexGuard<'_, TagGroup> {
        lock(&self.persistent)
    }

    pub(crate) fn output(&self) -> MutexGuard<'_, String> {
        self.output.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Tag types addressed by the `TagGroup*As<type>` functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Short,
    Long,
    UInt16,
    UInt32,
    Float,
    Double,
    Boolean,
    String,
    TagGroup,
}

impl TagKind {
    fn parse(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "short" => TagKind::Short,
            "long" => TagKind::Long,
            "uint16" => TagKind::UInt16,
            "uint32" => TagKind::UInt32,
            "float" => TagKind::Float,
            "double" | "number" => TagKind::Double,
            "boolean" => TagKind::Boolean,
            "string" => TagKind::String,
            "taggroup" => TagKind::TagGroup,
            _ => return None,
        })
    }

    fn to_tag(self, value: &Val) -> Result<TagValue, String> {
        Ok(match self {
            TagKind::Short => TagValue::Short(value.num("value")? as i16),
            TagKind::Long => TagValue::Long(value.num("value")? as i32),
            TagKind::UInt16 => TagValue::UInt16(value.num("value")? as u16),
            TagKind::UInt32 => TagValue::UInt32(value.num("value")? as u32),
            TagKind::Float => TagValue::Float(value.num("value")? as f32),
            TagKind::Double => TagValue::Double(value.num("value")?),
            TagKind::Boolean => TagValue::Boolean(value.num("value")? != 0.0),
            TagKind::String => TagValue::String(value.text("value")?),
            // snapshot before the target is locked; the source may be the target
            TagKind::TagGroup => TagValue::Group(lock(value.group_ref()?).clone()),
        })
    }

    /// Convert a stored tag, `None` if it cannot be read as this kind.
    fn from_tag(self, tag: &TagValue) -> Option<Val> {
        match self {
            TagKind::String => match tag {
                TagValue::String(s) => Some(Val::Str(s.clone())),
                TagValue::Group(_) => None,
                TagValue::Boolean(b) => Some(Val::Str(u8::from(*b).to_string())),
                number => number.as_number().map(|x| Val::Str(format_number(x))),
            },
            // copies; changes to the result do not reach the stored group
            TagKind::TagGroup => match tag {
                TagValue::Group(group) => Some(Val::group(group.clone())),
                _ => None,
            },
            _ => match tag {
                TagValue::Boolean(b) => Some(Val::bool(*b)),
                number => number.as_number().map(Val::Num),
            },
        }
    }
}

/// One step of a tag path: `a:b:[2]`.
enum Segment<'a> {
    Label(&'a str),
    Index(usize),
}

fn segments(path: &str) -> Result<Vec<Segment<'_>>, String> {
    path.split(':')
        .map(|part| match part.strip_prefix('[').and_then(|p| p.strip_suffix(']')) {
            Some(index) => index
                .trim()
                .parse()
                .map(Segment::Index)
                .map_err(|_| format!("invalid index in tag path {path:?}")),
            None if part.is_empty() => Err(format!("empty label in tag path {path:?}")),
            None => Ok(Segment::Label(part)),
        })
        .collect()
}

fn lookup<'g>(group: &'g TagGroup, path: &str) -> Result<Option<&'g TagValue>, String> {
    let mut current = group;
    let segments = segments(path)?;
    let Some((last, parents)) = segments.split_last() else {
        return Ok(None);
    };
    for segment in parents {
        let next = match segment {
            Segment::Label(label) => current.get(label),
            Segment::Index(index) => current.get_index(*index).map(|tag| &tag.value),
        };
        match next {
            Some(TagValue::Group(child)) => current = child,
            _ => return Ok(None),
        }
    }
    Ok(match last {
        Segment::Label(label) => current.get(label),
        Segment::Index(index) => current.get_index(*index).map(|tag| &tag.value),
    })
}

/// Store `value` at `path`, creating intermediate groups for labels.
fn store(group: &mut TagGroup, path: &str, value: TagValue) -> Result<(), String> {
    let segments = segments(path)?;
    let Some((last, parents)) = segments.split_last() else {
        return Err("empty tag path".into());
    };
    let mut current = group;
    for segment in parents {
        let slot = match segment {
            Segment::Label(label) => {
                if current.get(label).is_none() {
                    current.set(*label, TagValue::Group(TagGroup::new()));
                }
                current.get_mut(label)
            }
            Segment::Index(index) => current.get_index_mut(*index),
        };
        current = match slot {
            Some(TagValue::Group(child)) => child,
            _ => return Err(format!("tag path {path:?} does not lead to a group")),
        };
    }
    match last {
        Segment::Label(label) => current.set(*label, value),
        Segment::Index(index) => {
            if !current.set_index(*index, value) {
                return Err(format!("no tag at index {index}"));
            }
        }
    }
    Ok(())
}

/// Index argument; `infinity()` and other out-of-range values mean the end.
fn position(value: &Val, len: usize) -> Result<usize, String> {
    let x = value.num("index")?;
    if x.is_nan() || x < 0.0 {
        return Err(format!("invalid tag index {}", format_number(x)));
    }
    if x >= len as f64 {
        Ok(len)
    } else {
        Ok(x as usize)
    }
}

fn arity(name: &str, args: &[Val], n: usize) -> Result<(), String> {
    if args.len() == n {
        Ok(())
    } else {
        Err(format!("{name} takes {n} arguments, got {}", args.len()))
    }
}

/// Built-in functions available to scripts.
pub(crate) struct HostFunctions;

impl HostFunctions {
    /// Whether `name` is a getter returning its value through the last
    /// argument.
    pub(crate) fn is_getter(name: &str) -> bool {
        name.starts_with("taggroupgettagas") || name.starts_with("taggroupgetindexedtagas")
    }

    /// Run a getter with all arguments except the output variable.
    ///
    /// `Ok(None)` means the tag does not exist or has an incompatible type.
    pub(crate) fn get(name: &str, args: &[Val]) -> Result<Option<Val>, String> {
        arity(name, args, 2)?;
        let group = lock(args[0].group_ref()?);
        if let Some(suffix) = name.strip_prefix("taggroupgetindexedtagas") {
            let kind = TagKind::parse(suffix).ok_or_else(|| format!("unknown function {name}"))?;
            let index = args[1].num("index")?;
            if index < 0.0 || index.fract() != 0.0 {
                return Ok(None);
            }
            Ok(group
                .get_index(index as usize)
                .and_then(|tag| kind.from_tag(&tag.value)))
        } else if let Some(suffix) = name.strip_prefix("taggroupgettagas") {
            let kind = TagKind::parse(suffix).ok_or_else(|| format!("unknown function {name}"))?;
            let path = args[1].text("tag path")?;
            Ok(lookup(&group, &path)?.and_then(|tag| kind.from_tag(tag)))
        } else {
            Err(format!("unknown function {name}"))
        }
    }

    /// Call the built-in `name` (lowercase).
    pub(crate) fn call(state: &HostState, name: &str, args: &[Val]) -> Result<Val, String> {
        if let Some(suffix) = name.strip_prefix("taggroupsetindexedtagas") {
            arity(name, args, 3)?;
            let kind = TagKind::parse(suffix).ok_or_else(|| format!("unknown function {name}"))?;
            let value = kind.to_tag(&args[2])?;
            let mut group = lock(args[0].group_ref()?);
            let index = position(&args[1], group.len())?;
            if !group.set_index(index, value) {
                return Err(format!("no tag at index {index}"));
            }
            return Ok(Val::Num(0.0));
        }
        if let Some(suffix) = name.strip_prefix("taggroupsettagas") {
            arity(name, args, 3)?;
            let kind = TagKind::parse(suffix).ok_or_else(|| format!("unknown function {name}"))?;
            let value = kind.to_tag(&args[2])?;
            let path = args[1].text("tag path")?;
            store(&mut lock(args[0].group_ref()?), &path, value)?;
            return Ok(Val::Num(0.0));
        }
        if let Some(suffix) = name.strip_prefix("taggroupinserttagas") {
            arity(name, args, 3)?;
            let kind = TagKind::parse(suffix).ok_or_else(|| format!("unknown function {name}"))?;
            let value = kind.to_tag(&args[2])?;
            let mut group = lock(args[0].group_ref()?);
            let index = position(&args[1], group.len())?;
            group.insert(index, value);
            return Ok(Val::Num(index as f64));
        }

        match name {
            "newtaggroup" => {
                arity(name, args, 0)?;
                Ok(Val::group(TagGroup::new()))
            }
            "newtaglist" => {
                arity(name, args, 0)?;
                Ok(Val::group(TagGroup::new_list()))
            }
            "getpersistenttaggroup" => {
                arity(name, args, 0)?;
                Ok(Val::Group(Arc::clone(&state.persistent)))
            }
            "infinity" => {
                arity(name, args, 0)?;
                Ok(Val::Num(f64::INFINITY))
            }
            "abs" | "round" | "floor" | "ceil" | "sqrt" => {
                arity(name, args, 1)?;
                let x = args[0].num("argument")?;
                Ok(Val::Num(match name {
                    "abs" => x.abs(),
                    "round" => x.round(),
                    "floor" => x.floor(),
                    "ceil" => x.ceil(),
                    _ => x.sqrt(),
                }))
            }
            "min" | "max" => {
                arity(name, args, 2)?;
                let (a, b) = (args[0].num("argument")?, args[1].num("argument")?);
                Ok(Val::Num(if name == "min" { a.min(b) } else { a.max(b) }))
            }
            "len" => {
                arity(name, args, 1)?;
                Ok(Val::Num(args[0].text("argument")?.chars().count() as f64))
            }
            "result" => {
                arity(name, args, 1)?;
                let text = args[0].to_string();
                tracing::info!("script result: {}", text);
                state.output().push_str(&text);
                Ok(Val::Num(0.0))
            }
            "taggroupcreatenewlabeledtag" => {
                arity(name, args, 2)?;
                let label = args[1].text("label")?;
                let mut group = lock(args[0].group_ref()?);
                let index = match group.index_of(&label) {
                    Some(index) => index,
                    None => group.push_labeled(label, TagValue::Group(TagGroup::new())),
                };
                Ok(Val::Num(index as f64))
            }
            "taggroupcounttags" => {
                arity(name, args, 1)?;
                Ok(Val::Num(lock(args[0].group_ref()?).len() as f64))
            }
            "taggroupislist" => {
                arity(name, args, 1)?;
                Ok(Val::bool(lock(args[0].group_ref()?).is_list()))
            }
            "taggroupdoestagexist" => {
                arity(name, args, 2)?;
                let path = args[1].text("tag path")?;
                let group = lock(args[0].group_ref()?);
                Ok(Val::bool(lookup(&group, &path)?.is_some()))
            }
            "taggroupdeletetagwithlabel" => {
                arity(name, args, 2)?;
                let label = args[1].text("label")?;
                Ok(Val::bool(lock(args[0].group_ref()?).remove(&label).is_some()))
            }
            "taggroupgettaglabel" => {
                arity(name, args, 2)?;
                let group = lock(args[0].group_ref()?);
                let index = args[1].num("index")?;
                let label = group
                    .get_index(index as usize)
                    .filter(|_| index >= 0.0)
                    .and_then(|tag| tag.label.clone())
                    .unwrap_or_default();
                Ok(Val::Str(label))
            }
            "taggroupclone" => {
                arity(name, args, 1)?;
                Ok(Val::group(lock(args[0].group_ref()?).clone()))
            }
            "taggroupisvalid" => {
                arity(name, args, 1)?;
                Ok(Val::bool(matches!(args[0], Val::Group(_))))
            }
            _ => Err(format!("unknown function {name}")),
        }
    }
}
