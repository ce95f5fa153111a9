//! JVM class-file reader.
//!
//! Parses compiled `.class` bytes into a [`TypeDescriptor`]: the type's
//! supertype relations plus, per method, its invocation sites (owner,
//! name, descriptor, line, opcode), declared thrown types, and catch-block
//! handler types. Only the structures the call-graph analyzer needs are
//! materialized; everything else is skipped positionally.
//!
//! Parsing is strictly bounds-checked; any structural violation yields
//! [`GraphError::MalformedClass`] so one bad class never poisons a scan.

use std::path::Path;

use memmap2::Mmap;

use crate::error::{GraphError, IoError, Result};

// Class access flags.
const ACC_INTERFACE: u16 = 0x0200;
const ACC_ABSTRACT: u16 = 0x0400;
// Method access flags.
const ACC_BRIDGE: u16 = 0x0040;
const ACC_SYNTHETIC: u16 = 0x1000;

/// One method invocation found in bytecode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Owner class of the invoked method (dotted name).
    pub owner: String,
    /// Invoked method name.
    pub name: String,
    /// Invoked method descriptor.
    pub descriptor: String,
    /// Source line of the invocation, when a line table is present.
    pub line: Option<usize>,
    /// The invoke opcode (`invokevirtual`, `invokespecial`, ...).
    pub opcode: u8,
}

/// One catch handler found in a method's exception table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchSite {
    /// Caught exception class (dotted name); `None` for catch-all handlers.
    pub exception: Option<String>,
    /// Source line of the handler, when a line table is present.
    pub line: Option<usize>,
}

/// A parsed method.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    /// Method name.
    pub name: String,
    /// Method descriptor.
    pub descriptor: String,
    /// Whether the method is abstract (no code).
    pub is_abstract: bool,
    /// Whether the method is compiler-generated (synthetic or bridge).
    pub is_synthetic: bool,
    /// Classes named in the `Exceptions` attribute (dotted names).
    pub declared_throws: Vec<String>,
    /// Catch handlers from the `Code` exception table.
    pub catch_sites: Vec<CatchSite>,
    /// Invocation sites from the bytecode.
    pub calls: Vec<CallSite>,
    /// First line of the method body, when recorded.
    pub line_number: Option<usize>,
}

/// A parsed class.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    /// Fully qualified dotted class name.
    pub class_name: String,
    /// Superclass (dotted), absent only for `java.lang.Object`.
    pub super_name: Option<String>,
    /// Directly implemented interfaces (dotted).
    pub interfaces: Vec<String>,
    /// Whether the type is an interface.
    pub is_interface: bool,
    /// Whether the type is abstract.
    pub is_abstract: bool,
    /// `SourceFile` attribute value.
    pub source_file: Option<String>,
    /// Declared methods.
    pub methods: Vec<MethodInfo>,
}

/// Parses a class file from disk via a read-only memory map.
///
/// # Errors
///
/// Returns an I/O error when the file cannot be opened or mapped, and
/// [`GraphError::MalformedClass`] when the bytes are not a valid class file.
pub fn parse_class_file(path: &Path) -> Result<TypeDescriptor> {
    let file = std::fs::File::open(path).map_err(|e| IoError::ReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    // SAFETY: the file is mapped read-only and dropped before any
    // modification could occur; parsing never outlives the map.
    #[allow(unsafe_code)]
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| IoError::MmapFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_class(&mmap, &path.display().to_string())
}

/// Parses class bytes. `origin` labels errors.
///
/// # Errors
///
/// Returns [`GraphError::MalformedClass`] on any structural violation.
pub fn parse_class(bytes: &[u8], origin: &str) -> Result<TypeDescriptor> {
    let mut r = Reader::new(bytes, origin);

    if r.u32()? != 0xCAFE_BABE {
        return Err(r.malformed("bad magic"));
    }
    let _minor = r.u16()?;
    let _major = r.u16()?;

    let pool = ConstantPool::parse(&mut r)?;

    let access_flags = r.u16()?;
    let this_class = r.u16()?;
    let super_class = r.u16()?;

    let class_name = pool.class_name(this_class, &r)?;
    let super_name = if super_class == 0 {
        None
    } else {
        Some(pool.class_name(super_class, &r)?)
    };

    let interface_count = r.u16()?;
    let mut interfaces = Vec::with_capacity(usize::from(interface_count));
    for _ in 0..interface_count {
        let idx = r.u16()?;
        interfaces.push(pool.class_name(idx, &r)?);
    }

    // Fields: skipped positionally.
    let field_count = r.u16()?;
    for _ in 0..field_count {
        r.skip(6)?; // access, name, descriptor
        skip_attributes(&mut r)?;
    }

    let method_count = r.u16()?;
    let mut methods = Vec::with_capacity(usize::from(method_count));
    for _ in 0..method_count {
        methods.push(parse_method(&mut r, &pool)?);
    }

    // Class attributes: keep SourceFile.
    let mut source_file = None;
    let attr_count = r.u16()?;
    for _ in 0..attr_count {
        let name_idx = r.u16()?;
        let len = r.u32()? as usize;
        if pool.utf8(name_idx, &r)? == "SourceFile" && len == 2 {
            let idx = r.u16()?;
            source_file = Some(pool.utf8(idx, &r)?.to_string());
        } else {
            r.skip(len)?;
        }
    }

    Ok(TypeDescriptor {
        class_name,
        super_name,
        interfaces,
        is_interface: access_flags & ACC_INTERFACE != 0,
        is_abstract: access_flags & ACC_ABSTRACT != 0,
        source_file,
        methods,
    })
}

fn parse_method(r: &mut Reader<'_>, pool: &ConstantPool) -> Result<MethodInfo> {
    let access_flags = r.u16()?;
    let name_idx = r.u16()?;
    let desc_idx = r.u16()?;

    let mut method = MethodInfo {
        name: pool.utf8(name_idx, r)?.to_string(),
        descriptor: pool.utf8(desc_idx, r)?.to_string(),
        is_abstract: access_flags & ACC_ABSTRACT != 0,
        is_synthetic: access_flags & (ACC_SYNTHETIC | ACC_BRIDGE) != 0,
        declared_throws: Vec::new(),
        catch_sites: Vec::new(),
        calls: Vec::new(),
        line_number: None,
    };

    let attr_count = r.u16()?;
    for _ in 0..attr_count {
        let attr_name_idx = r.u16()?;
        let len = r.u32()? as usize;
        match pool.utf8(attr_name_idx, r)? {
            "Code" => parse_code(r, pool, &mut method)?,
            "Exceptions" => {
                let count = r.u16()?;
                for _ in 0..count {
                    let idx = r.u16()?;
                    method.declared_throws.push(pool.class_name(idx, r)?);
                }
            }
            _ => r.skip(len)?,
        }
    }

    Ok(method)
}

fn parse_code(r: &mut Reader<'_>, pool: &ConstantPool, method: &mut MethodInfo) -> Result<()> {
    let _max_stack = r.u16()?;
    let _max_locals = r.u16()?;
    let code_len = r.u32()? as usize;
    let code = r.bytes(code_len)?.to_vec();

    // Exception table: (start, end, handler, catch_type).
    let mut handlers: Vec<(usize, Option<String>)> = Vec::new();
    let table_len = r.u16()?;
    for _ in 0..table_len {
        let _start_pc = r.u16()?;
        let _end_pc = r.u16()?;
        let handler_pc = usize::from(r.u16()?);
        let catch_type = r.u16()?;
        let exception = if catch_type == 0 {
            None
        } else {
            Some(pool.class_name(catch_type, r)?)
        };
        handlers.push((handler_pc, exception));
    }

    // Code attributes: keep LineNumberTable.
    let mut line_table: Vec<(usize, usize)> = Vec::new();
    let attr_count = r.u16()?;
    for _ in 0..attr_count {
        let name_idx = r.u16()?;
        let len = r.u32()? as usize;
        if pool.utf8(name_idx, r)? == "LineNumberTable" {
            let entries = r.u16()?;
            for _ in 0..entries {
                let start_pc = usize::from(r.u16()?);
                let line = usize::from(r.u16()?);
                line_table.push((start_pc, line));
            }
        } else {
            r.skip(len)?;
        }
    }
    line_table.sort_unstable();
    method.line_number = line_table.iter().map(|&(_, line)| line).min();

    for (handler_pc, exception) in handlers {
        method.catch_sites.push(CatchSite {
            exception,
            line: line_for_pc(&line_table, handler_pc),
        });
    }

    scan_instructions(&code, pool, &line_table, method, r)
}

/// Walks the bytecode stream and records every `invoke*` site.
fn scan_instructions(
    code: &[u8],
    pool: &ConstantPool,
    line_table: &[(usize, usize)],
    method: &mut MethodInfo,
    r: &Reader<'_>,
) -> Result<()> {
    let mut pc = 0usize;
    while pc < code.len() {
        let op = code[pc];
        match op {
            // invokevirtual, invokespecial, invokestatic
            0xB6..=0xB8 => {
                let idx = operand_u16(code, pc, r)?;
                if let Some((owner, name, descriptor)) = pool.method_ref(idx) {
                    method.calls.push(CallSite {
                        owner,
                        name,
                        descriptor,
                        line: line_for_pc(line_table, pc),
                        opcode: op,
                    });
                }
                pc += 3;
            }
            // invokeinterface: two extra operand bytes
            0xB9 => {
                let idx = operand_u16(code, pc, r)?;
                if let Some((owner, name, descriptor)) = pool.method_ref(idx) {
                    method.calls.push(CallSite {
                        owner,
                        name,
                        descriptor,
                        line: line_for_pc(line_table, pc),
                        opcode: op,
                    });
                }
                pc += 5;
            }
            // invokedynamic: no static owner, skipped
            0xBA => pc += 5,
            // tableswitch
            0xAA => {
                let cursor = aligned(pc);
                let low = switch_i32(code, cursor + 4, r)?;
                let high = switch_i32(code, cursor + 8, r)?;
                let count = usize::try_from(i64::from(high) - i64::from(low) + 1)
                    .map_err(|_| r.malformed("tableswitch bounds"))?;
                pc = cursor + 12 + count * 4;
            }
            // lookupswitch
            0xAB => {
                let cursor = aligned(pc);
                let npairs = usize::try_from(switch_i32(code, cursor + 4, r)?)
                    .map_err(|_| r.malformed("lookupswitch pairs"))?;
                pc = cursor + 8 + npairs * 8;
            }
            // wide
            0xC4 => {
                let modified = code
                    .get(pc + 1)
                    .copied()
                    .ok_or_else(|| r.malformed("truncated wide"))?;
                pc += if modified == 0x84 { 6 } else { 4 };
            }
            _ => pc += instruction_len(op).ok_or_else(|| r.malformed("unknown opcode"))?,
        }
    }
    Ok(())
}

/// Fixed instruction lengths for every non-variable opcode.
const fn instruction_len(op: u8) -> Option<usize> {
    Some(match op {
        0x00..=0x0F | 0x1A..=0x35 | 0x3B..=0x83 | 0x85..=0x98 | 0xAC..=0xB1 | 0xBE | 0xBF
        | 0xC2 | 0xC3 => 1,
        0x10 | 0x12 | 0x15..=0x19 | 0x36..=0x3A | 0xA9 | 0xBC => 2,
        0x11 | 0x13 | 0x14 | 0x84 | 0x99..=0xA8 | 0xB2..=0xB5 | 0xBB | 0xBD | 0xC0 | 0xC1
        | 0xC6 | 0xC7 => 3,
        0xC5 => 4,
        0xC8 | 0xC9 => 5,
        _ => return None,
    })
}

/// Switch padding: operands start at the next 4-byte boundary after the opcode.
const fn aligned(pc: usize) -> usize {
    (pc + 4) & !3
}

fn operand_u16(code: &[u8], pc: usize, r: &Reader<'_>) -> Result<u16> {
    match (code.get(pc + 1), code.get(pc + 2)) {
        (Some(&hi), Some(&lo)) => Ok(u16::from_be_bytes([hi, lo])),
        _ => Err(r.malformed("truncated invoke operand")),
    }
}

fn switch_i32(code: &[u8], at: usize, r: &Reader<'_>) -> Result<i32> {
    let slice = code
        .get(at..at + 4)
        .ok_or_else(|| r.malformed("truncated switch"))?;
    Ok(i32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

/// The line of the last table entry at or before `pc`.
fn line_for_pc(line_table: &[(usize, usize)], pc: usize) -> Option<usize> {
    line_table
        .iter()
        .take_while(|&&(start, _)| start <= pc)
        .last()
        .map(|&(_, line)| line)
}

// ---------------------------------------------------------------------------
// Constant pool
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum CpEntry {
    Utf8(String),
    Class(u16),
    NameAndType(u16, u16),
    MethodRef(u16, u16),
    Other,
}

struct ConstantPool {
    entries: Vec<CpEntry>,
}

impl ConstantPool {
    fn parse(r: &mut Reader<'_>) -> Result<Self> {
        let count = r.u16()?;
        let mut entries = vec![CpEntry::Other; usize::from(count)];
        let mut i = 1u16;
        while i < count {
            let tag = r.u8()?;
            let entry = match tag {
                1 => {
                    let len = r.u16()? as usize;
                    let bytes = r.bytes(len)?;
                    CpEntry::Utf8(String::from_utf8_lossy(bytes).into_owned())
                }
                7 => CpEntry::Class(r.u16()?),
                9 => {
                    r.skip(4)?;
                    CpEntry::Other
                }
                10 | 11 => CpEntry::MethodRef(r.u16()?, r.u16()?),
                12 => CpEntry::NameAndType(r.u16()?, r.u16()?),
                3 | 4 | 17 | 18 => {
                    r.skip(4)?;
                    CpEntry::Other
                }
                8 | 16 | 19 | 20 => {
                    r.skip(2)?;
                    CpEntry::Other
                }
                15 => {
                    r.skip(3)?;
                    CpEntry::Other
                }
                5 | 6 => {
                    r.skip(8)?;
                    CpEntry::Other
                }
                _ => return Err(r.malformed("unknown constant pool tag")),
            };
            let slot = usize::from(i);
            entries[slot] = entry;
            // Longs and doubles occupy two pool slots.
            i += if tag == 5 || tag == 6 { 2 } else { 1 };
        }
        Ok(Self { entries })
    }

    fn get(&self, idx: u16) -> Option<&CpEntry> {
        self.entries.get(usize::from(idx))
    }

    fn utf8<'a>(&'a self, idx: u16, r: &Reader<'_>) -> Result<&'a str> {
        match self.get(idx) {
            Some(CpEntry::Utf8(s)) => Ok(s),
            _ => Err(r.malformed("expected Utf8 constant")),
        }
    }

    /// Dotted class name behind a `Class` constant.
    fn class_name(&self, idx: u16, r: &Reader<'_>) -> Result<String> {
        match self.get(idx) {
            Some(&CpEntry::Class(name_idx)) => {
                Ok(self.utf8(name_idx, r)?.replace('/', "."))
            }
            _ => Err(r.malformed("expected Class constant")),
        }
    }

    /// Resolves a Methodref/InterfaceMethodref into (owner, name, descriptor).
    /// Array-class owners (e.g. `[Ljava.lang.Object;`) resolve to `None`.
    fn method_ref(&self, idx: u16) -> Option<(String, String, String)> {
        let &CpEntry::MethodRef(class_idx, nat_idx) = self.get(idx)? else {
            return None;
        };
        let &CpEntry::Class(owner_idx) = self.get(class_idx)? else {
            return None;
        };
        let CpEntry::Utf8(owner) = self.get(owner_idx)? else {
            return None;
        };
        if owner.starts_with('[') {
            return None;
        }
        let &CpEntry::NameAndType(name_idx, desc_idx) = self.get(nat_idx)? else {
            return None;
        };
        let CpEntry::Utf8(name) = self.get(name_idx)? else {
            return None;
        };
        let CpEntry::Utf8(descriptor) = self.get(desc_idx)? else {
            return None;
        };
        Some((owner.replace('/', "."), name.clone(), descriptor.clone()))
    }
}

fn skip_attributes(r: &mut Reader<'_>) -> Result<()> {
    let count = r.u16()?;
    for _ in 0..count {
        r.skip(2)?;
        let len = r.u32()? as usize;
        r.skip(len)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Bounds-checked byte reader
// ---------------------------------------------------------------------------

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    origin: String,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], origin: &str) -> Self {
        Self {
            bytes,
            pos: 0,
            origin: origin.to_string(),
        }
    }

    fn malformed(&self, reason: &str) -> crate::error::Error {
        GraphError::MalformedClass {
            path: self.origin.clone(),
            reason: format!("{reason} (offset {})", self.pos),
        }
        .into()
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| self.malformed("unexpected end of file"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.bytes(len).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testkit::ClassBuilder;

    #[test]
    fn test_rejects_bad_magic() {
        let result = parse_class(&[0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 0], "test");
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_truncated() {
        let bytes = ClassBuilder::new("com.example.Foo").build();
        let result = parse_class(&bytes[..bytes.len() / 2], "test");
        assert!(result.is_err());
    }

    #[test]
    fn test_parses_empty_class() {
        let bytes = ClassBuilder::new("com.example.Foo")
            .source_file("Foo.java")
            .build();
        let parsed = parse_class(&bytes, "test").unwrap();
        assert_eq!(parsed.class_name, "com.example.Foo");
        assert_eq!(parsed.super_name.as_deref(), Some("java.lang.Object"));
        assert_eq!(parsed.source_file.as_deref(), Some("Foo.java"));
        assert!(!parsed.is_interface);
        assert!(parsed.methods.is_empty());
    }

    #[test]
    fn test_parses_interface_flag() {
        let bytes = ClassBuilder::new("com.example.Service").interface().build();
        let parsed = parse_class(&bytes, "test").unwrap();
        assert!(parsed.is_interface);
        assert!(parsed.is_abstract);
    }

    #[test]
    fn test_parses_calls_with_lines() {
        let bytes = ClassBuilder::new("com.example.Foo")
            .method("run", "()V", |m| {
                m.line(10)
                    .call("com.example.Bar", "helper", "()V")
                    .call("com.example.Baz", "other", "(I)V")
            })
            .build();
        let parsed = parse_class(&bytes, "test").unwrap();
        assert_eq!(parsed.methods.len(), 1);
        let method = &parsed.methods[0];
        assert_eq!(method.name, "run");
        assert_eq!(method.calls.len(), 2);
        assert_eq!(method.calls[0].owner, "com.example.Bar");
        assert_eq!(method.calls[0].name, "helper");
        assert_eq!(method.calls[0].line, Some(10));
        assert_eq!(method.calls[1].owner, "com.example.Baz");
        assert_eq!(method.calls[1].descriptor, "(I)V");
    }

    #[test]
    fn test_parses_throws_and_catches() {
        let bytes = ClassBuilder::new("com.example.Foo")
            .method("run", "()V", |m| {
                m.throws("com.example.FooException")
                    .catches("java.io.IOException")
            })
            .build();
        let parsed = parse_class(&bytes, "test").unwrap();
        let method = &parsed.methods[0];
        assert_eq!(method.declared_throws, vec!["com.example.FooException"]);
        assert_eq!(method.catch_sites.len(), 1);
        assert_eq!(
            method.catch_sites[0].exception.as_deref(),
            Some("java.io.IOException")
        );
    }

    #[test]
    fn test_catch_all_handler() {
        let bytes = ClassBuilder::new("com.example.Foo")
            .method("run", "()V", |m| m.catches_all())
            .build();
        let parsed = parse_class(&bytes, "test").unwrap();
        assert_eq!(parsed.methods[0].catch_sites.len(), 1);
        assert!(parsed.methods[0].catch_sites[0].exception.is_none());
    }

    #[test]
    fn test_abstract_method_has_no_code() {
        let bytes = ClassBuilder::new("com.example.Service")
            .interface()
            .method("find", "(J)V", |m| m.abstract_method())
            .build();
        let parsed = parse_class(&bytes, "test").unwrap();
        assert!(parsed.methods[0].is_abstract);
        assert!(parsed.methods[0].calls.is_empty());
    }

    #[test]
    fn test_line_for_pc() {
        let table = vec![(0, 5), (4, 6), (10, 9)];
        assert_eq!(line_for_pc(&table, 0), Some(5));
        assert_eq!(line_for_pc(&table, 3), Some(5));
        assert_eq!(line_for_pc(&table, 7), Some(6));
        assert_eq!(line_for_pc(&table, 50), Some(9));
    }
}
