//! Minimal class-file writer for tests.
//!
//! Emits structurally valid class files: constant pool, supertype relations,
//! methods with Code attributes (invoke sequences, exception tables, line
//! tables) and Exceptions attributes. Only what the parser and analyzer
//! tests exercise.

use std::collections::HashMap;

const ACC_PUBLIC: u16 = 0x0001;
const ACC_INTERFACE: u16 = 0x0200;
const ACC_ABSTRACT: u16 = 0x0400;

/// Specification of one method to emit.
#[derive(Debug, Clone)]
pub struct MethodSpec {
    name: String,
    descriptor: String,
    calls: Vec<(String, String, String)>,
    throws: Vec<String>,
    catches: Vec<Option<String>>,
    line: Option<u16>,
    is_abstract: bool,
}

impl MethodSpec {
    fn new(name: &str, descriptor: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            calls: Vec::new(),
            throws: Vec::new(),
            catches: Vec::new(),
            line: None,
            is_abstract: false,
        }
    }

    /// Adds an `invokevirtual` site.
    #[must_use]
    pub fn call(mut self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.calls
            .push((owner.to_string(), name.to_string(), descriptor.to_string()));
        self
    }

    /// Adds a declared thrown type.
    #[must_use]
    pub fn throws(mut self, class: &str) -> Self {
        self.throws.push(class.to_string());
        self
    }

    /// Adds a typed catch handler.
    #[must_use]
    pub fn catches(mut self, class: &str) -> Self {
        self.catches.push(Some(class.to_string()));
        self
    }

    /// Adds a catch-all handler.
    #[must_use]
    pub fn catches_all(mut self) -> Self {
        self.catches.push(None);
        self
    }

    /// Sets the line-number-table line for the method body.
    #[must_use]
    pub const fn line(mut self, line: u16) -> Self {
        self.line = Some(line);
        self
    }

    /// Marks the method abstract (no Code attribute).
    #[must_use]
    pub const fn abstract_method(mut self) -> Self {
        self.is_abstract = true;
        self
    }
}

/// Builder for one class file.
#[derive(Debug)]
pub struct ClassBuilder {
    name: String,
    super_name: String,
    interfaces: Vec<String>,
    access_flags: u16,
    methods: Vec<MethodSpec>,
    source_file: Option<String>,
}

impl ClassBuilder {
    /// Starts a public class extending `java.lang.Object`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            super_name: "java.lang.Object".to_string(),
            interfaces: Vec::new(),
            access_flags: ACC_PUBLIC,
            methods: Vec::new(),
            source_file: None,
        }
    }

    /// Marks the class as an interface.
    #[must_use]
    pub const fn interface(mut self) -> Self {
        self.access_flags |= ACC_INTERFACE | ACC_ABSTRACT;
        self
    }

    /// Marks the class abstract.
    #[must_use]
    pub const fn abstract_class(mut self) -> Self {
        self.access_flags |= ACC_ABSTRACT;
        self
    }

    /// Sets the superclass.
    #[must_use]
    pub fn extends(mut self, super_name: &str) -> Self {
        self.super_name = super_name.to_string();
        self
    }

    /// Adds an implemented interface.
    #[must_use]
    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    /// Sets the SourceFile attribute.
    #[must_use]
    pub fn source_file(mut self, name: &str) -> Self {
        self.source_file = Some(name.to_string());
        self
    }

    /// Adds a method configured by the given closure.
    #[must_use]
    pub fn method(
        mut self,
        name: &str,
        descriptor: &str,
        configure: impl FnOnce(MethodSpec) -> MethodSpec,
    ) -> Self {
        self.methods.push(configure(MethodSpec::new(name, descriptor)));
        self
    }

    /// Serializes the class file.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let mut pool = Pool::new();

        let this_class = pool.class(&self.name);
        let super_class = pool.class(&self.super_name);
        let interface_indices: Vec<u16> =
            self.interfaces.iter().map(|i| pool.class(i)).collect();

        // Method bodies reference the pool, so build them before serializing it.
        let method_bytes: Vec<Vec<u8>> = self
            .methods
            .iter()
            .map(|m| emit_method(m, &mut pool))
            .collect();

        let class_attrs: Vec<Vec<u8>> = self
            .source_file
            .iter()
            .map(|source| {
                let name_idx = pool.utf8("SourceFile");
                let value_idx = pool.utf8(source);
                let mut attr = Vec::new();
                push_u16(&mut attr, name_idx);
                push_u32(&mut attr, 2);
                push_u16(&mut attr, value_idx);
                attr
            })
            .collect();

        let mut out = Vec::new();
        push_u32(&mut out, 0xCAFE_BABE);
        push_u16(&mut out, 0); // minor
        push_u16(&mut out, 52); // major (Java 8)
        push_u16(&mut out, pool.count());
        out.extend_from_slice(&pool.data);
        push_u16(&mut out, self.access_flags);
        push_u16(&mut out, this_class);
        push_u16(&mut out, super_class);
        push_u16(&mut out, u16::try_from(interface_indices.len()).unwrap_or(0));
        for idx in interface_indices {
            push_u16(&mut out, idx);
        }
        push_u16(&mut out, 0); // fields
        push_u16(&mut out, u16::try_from(method_bytes.len()).unwrap_or(0));
        for bytes in method_bytes {
            out.extend_from_slice(&bytes);
        }
        push_u16(&mut out, u16::try_from(class_attrs.len()).unwrap_or(0));
        for attr in class_attrs {
            out.extend_from_slice(&attr);
        }
        out
    }
}

fn emit_method(spec: &MethodSpec, pool: &mut Pool) -> Vec<u8> {
    let name_idx = pool.utf8(&spec.name);
    let desc_idx = pool.utf8(&spec.descriptor);

    let mut attrs: Vec<Vec<u8>> = Vec::new();

    if !spec.is_abstract {
        attrs.push(emit_code(spec, pool));
    }

    if !spec.throws.is_empty() {
        let attr_name = pool.utf8("Exceptions");
        let indices: Vec<u16> = spec.throws.iter().map(|t| pool.class(t)).collect();
        let mut attr = Vec::new();
        push_u16(&mut attr, attr_name);
        push_u32(&mut attr, 2 + 2 * indices.len() as u32);
        push_u16(&mut attr, u16::try_from(indices.len()).unwrap_or(0));
        for idx in indices {
            push_u16(&mut attr, idx);
        }
        attrs.push(attr);
    }

    let flags = if spec.is_abstract {
        ACC_PUBLIC | ACC_ABSTRACT
    } else {
        ACC_PUBLIC
    };

    let mut out = Vec::new();
    push_u16(&mut out, flags);
    push_u16(&mut out, name_idx);
    push_u16(&mut out, desc_idx);
    push_u16(&mut out, u16::try_from(attrs.len()).unwrap_or(0));
    for attr in attrs {
        out.extend_from_slice(&attr);
    }
    out
}

fn emit_code(spec: &MethodSpec, pool: &mut Pool) -> Vec<u8> {
    let attr_name = pool.utf8("Code");

    // Code: one invokevirtual per call, a return, and a trailing return
    // that doubles as the shared catch-handler target.
    let mut code = Vec::new();
    for (owner, name, descriptor) in &spec.calls {
        let idx = pool.method_ref(owner, name, descriptor);
        code.push(0xB6);
        push_u16(&mut code, idx);
    }
    code.push(0xB1);
    code.push(0xB1);
    let handler_pc = u16::try_from(code.len() - 1).unwrap_or(0);

    let catch_entries: Vec<(u16, u16)> = spec
        .catches
        .iter()
        .map(|catch| {
            let type_idx = catch.as_deref().map_or(0, |c| pool.class(c));
            (handler_pc, type_idx)
        })
        .collect();

    let line_entries: Vec<(u16, u16)> = spec.line.map(|line| (0, line)).into_iter().collect();

    let mut body = Vec::new();
    push_u16(&mut body, 8); // max_stack
    push_u16(&mut body, 8); // max_locals
    push_u32(&mut body, code.len() as u32);
    body.extend_from_slice(&code);
    push_u16(&mut body, u16::try_from(catch_entries.len()).unwrap_or(0));
    for (handler, type_idx) in catch_entries {
        push_u16(&mut body, 0); // start_pc
        push_u16(&mut body, handler); // end_pc
        push_u16(&mut body, handler); // handler_pc
        push_u16(&mut body, type_idx);
    }
    if line_entries.is_empty() {
        push_u16(&mut body, 0); // no code attributes
    } else {
        push_u16(&mut body, 1);
        let lnt_name = pool.utf8("LineNumberTable");
        push_u16(&mut body, lnt_name);
        push_u32(&mut body, 2 + 4 * line_entries.len() as u32);
        push_u16(&mut body, u16::try_from(line_entries.len()).unwrap_or(0));
        for (pc, line) in line_entries {
            push_u16(&mut body, pc);
            push_u16(&mut body, line);
        }
    }

    let mut attr = Vec::new();
    push_u16(&mut attr, attr_name);
    push_u32(&mut attr, body.len() as u32);
    attr.extend_from_slice(&body);
    attr
}

/// Growing constant pool with entry deduplication.
struct Pool {
    data: Vec<u8>,
    next: u16,
    utf8: HashMap<String, u16>,
    classes: HashMap<String, u16>,
    nats: HashMap<(u16, u16), u16>,
    method_refs: HashMap<(u16, u16), u16>,
}

impl Pool {
    fn new() -> Self {
        Self {
            data: Vec::new(),
            next: 1,
            utf8: HashMap::new(),
            classes: HashMap::new(),
            nats: HashMap::new(),
            method_refs: HashMap::new(),
        }
    }

    const fn count(&self) -> u16 {
        self.next
    }

    fn add(&mut self) -> u16 {
        let idx = self.next;
        self.next += 1;
        idx
    }

    fn utf8(&mut self, value: &str) -> u16 {
        if let Some(&idx) = self.utf8.get(value) {
            return idx;
        }
        self.data.push(1);
        push_u16(&mut self.data, u16::try_from(value.len()).unwrap_or(0));
        self.data.extend_from_slice(value.as_bytes());
        let idx = self.add();
        self.utf8.insert(value.to_string(), idx);
        idx
    }

    fn class(&mut self, dotted: &str) -> u16 {
        if let Some(&idx) = self.classes.get(dotted) {
            return idx;
        }
        let name_idx = self.utf8(&dotted.replace('.', "/"));
        self.data.push(7);
        push_u16(&mut self.data, name_idx);
        let idx = self.add();
        self.classes.insert(dotted.to_string(), idx);
        idx
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_idx = self.utf8(name);
        let desc_idx = self.utf8(descriptor);
        if let Some(&idx) = self.nats.get(&(name_idx, desc_idx)) {
            return idx;
        }
        self.data.push(12);
        push_u16(&mut self.data, name_idx);
        push_u16(&mut self.data, desc_idx);
        let idx = self.add();
        self.nats.insert((name_idx, desc_idx), idx);
        idx
    }

    fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class_idx = self.class(owner);
        let nat_idx = self.name_and_type(name, descriptor);
        if let Some(&idx) = self.method_refs.get(&(class_idx, nat_idx)) {
            return idx;
        }
        self.data.push(10);
        push_u16(&mut self.data, class_idx);
        push_u16(&mut self.data, nat_idx);
        let idx = self.add();
        self.method_refs.insert((class_idx, nat_idx), idx);
        idx
    }
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}
