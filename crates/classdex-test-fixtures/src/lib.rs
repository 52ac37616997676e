//! Test fixtures for classdex
//!
//! Builds minimal class files, compiled-output directories and dependency jars
//! on the fly so no binaries need to live in the repository.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;

pub const OBJECT: &str = "java/lang/Object";

/// Default fragment directory shared by producer and consumer modules
pub const FRAGMENT_DIR: &str = "META-INF/io/github/absketches/plugin/";

/// Builder for the smallest class file the header reader accepts
#[derive(Debug, Clone)]
pub struct ClassFileBuilder {
    name: String,
    super_name: Option<String>,
    access_flags: u16,
    padded: bool,
}

impl ClassFileBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            super_name: Some(OBJECT.to_string()),
            access_flags: ACC_PUBLIC,
            padded: false,
        }
    }

    pub fn extends(mut self, super_name: &str) -> Self {
        self.super_name = Some(super_name.to_string());
        self
    }

    /// Produce a root class with `super_class == 0`
    pub fn without_super(mut self) -> Self {
        self.super_name = None;
        self
    }

    pub fn access(mut self, access_flags: u16) -> Self {
        self.access_flags = access_flags;
        self
    }

    /// Prefix the constant pool with one entry of every other tag, so the
    /// class entries only resolve if every payload was skipped correctly.
    pub fn padded(mut self) -> Self {
        self.padded = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool = ConstantPoolWriter::default();
        if self.padded {
            pool.push_every_kind();
        }

        let this_utf8 = pool.utf8(&self.name);
        let this_class = pool.class(this_utf8);
        let super_class = match &self.super_name {
            Some(super_name) => {
                let super_utf8 = pool.utf8(super_name);
                pool.class(super_utf8)
            }
            None => 0,
        };

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABE_u32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // minor
        out.extend_from_slice(&61u16.to_be_bytes()); // major
        out.extend_from_slice(&pool.next.to_be_bytes());
        out.extend_from_slice(&pool.bytes);
        out.extend_from_slice(&self.access_flags.to_be_bytes());
        out.extend_from_slice(&this_class.to_be_bytes());
        out.extend_from_slice(&super_class.to_be_bytes());
        // interfaces, fields, methods, attributes
        for _ in 0..4 {
            out.extend_from_slice(&0u16.to_be_bytes());
        }
        out
    }
}

struct ConstantPoolWriter {
    bytes: Vec<u8>,
    next: u16,
}

impl Default for ConstantPoolWriter {
    fn default() -> Self {
        Self {
            bytes: Vec::new(),
            next: 1,
        }
    }
}

impl ConstantPoolWriter {
    fn utf8(&mut self, value: &str) -> u16 {
        self.bytes.push(1);
        self.bytes
            .extend_from_slice(&(value.len() as u16).to_be_bytes());
        self.bytes.extend_from_slice(value.as_bytes());
        self.take(1)
    }

    fn class(&mut self, name_index: u16) -> u16 {
        self.bytes.push(7);
        self.bytes.extend_from_slice(&name_index.to_be_bytes());
        self.take(1)
    }

    fn raw(&mut self, tag: u8, payload: &[u8], slots: u16) {
        self.bytes.push(tag);
        self.bytes.extend_from_slice(payload);
        self.take(slots);
    }

    fn push_every_kind(&mut self) {
        self.utf8("Code");
        self.utf8("(Ljava/lang/String;)V");
        self.raw(3, &[0, 0, 0, 42], 1); // Integer
        self.raw(4, &[0x3F, 0x80, 0, 0], 1); // Float
        self.raw(5, &[0, 0, 0, 0, 0, 0, 0, 7], 2); // Long
        self.raw(6, &[0x40, 0x09, 0x21, 0xFB, 0x54, 0x44, 0x2D, 0x18], 2); // Double
        self.raw(8, &[0, 1], 1); // String
        self.raw(9, &[0, 1, 0, 2], 1); // Fieldref
        self.raw(10, &[0, 1, 0, 2], 1); // Methodref
        self.raw(11, &[0, 1, 0, 2], 1); // InterfaceMethodref
        self.raw(12, &[0, 1, 0, 2], 1); // NameAndType
        self.raw(15, &[6, 0, 3], 1); // MethodHandle
        self.raw(16, &[0, 2], 1); // MethodType
        self.raw(17, &[0, 0, 0, 4], 1); // Dynamic
        self.raw(18, &[0, 0, 0, 4], 1); // InvokeDynamic
        self.raw(19, &[0, 1], 1); // Module
        self.raw(20, &[0, 1], 1); // Package
    }

    fn take(&mut self, slots: u16) -> u16 {
        let index = self.next;
        self.next += slots;
        index
    }
}

/// Shorthand for a plain class extending `super_name`
pub fn class_bytes(name: &str, super_name: &str, access_flags: u16) -> Vec<u8> {
    ClassFileBuilder::new(name)
        .extends(super_name)
        .access(access_flags)
        .build()
}

/// In-memory jar layout, written to disk with [`JarBuilder::write`]
#[derive(Debug, Default)]
pub struct JarBuilder {
    entries: Vec<JarEntry>,
}

#[derive(Debug)]
enum JarEntry {
    Directory(String),
    File(String, Vec<u8>),
}

impl JarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(self, name: &str, super_name: &str, access_flags: u16) -> Self {
        self.entry(
            &format!("{}.class", name),
            class_bytes(name, super_name, access_flags),
        )
    }

    /// Add a `.properties` fragment under the default fragment directory
    pub fn fragment(self, file_name: &str, content: &str) -> Self {
        self.entry(&format!("{}{}", FRAGMENT_DIR, file_name), content)
    }

    pub fn entry(mut self, path: &str, data: impl AsRef<[u8]>) -> Self {
        self.entries
            .push(JarEntry::File(path.to_string(), data.as_ref().to_vec()));
        self
    }

    pub fn directory(mut self, path: &str) -> Self {
        self.entries.push(JarEntry::Directory(path.to_string()));
        self
    }

    pub fn write(&self, path: &Path) -> PathBuf {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create jar parent");
        }
        let file = File::create(path).expect("create jar");
        let mut writer = zip::ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

        for entry in &self.entries {
            match entry {
                JarEntry::Directory(name) => {
                    writer
                        .add_directory(name.as_str(), options)
                        .expect("add jar directory");
                }
                JarEntry::File(name, data) => {
                    writer
                        .start_file(name.as_str(), options)
                        .expect("start jar entry");
                    writer.write_all(data).expect("write jar entry");
                }
            }
        }

        writer.finish().expect("finish jar");
        path.to_path_buf()
    }
}

/// Scratch project: a compiled-output directory plus a place for dependency jars
pub struct TestFixtures {
    temp_dir: tempfile::TempDir,
}

impl Default for TestFixtures {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixtures {
    pub fn new() -> Self {
        Self {
            temp_dir: tempfile::tempdir().expect("create fixture dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Compiled-output directory, created on first use
    pub fn classes_dir(&self) -> PathBuf {
        let dir = self.root().join("classes");
        fs::create_dir_all(&dir).expect("create classes dir");
        dir
    }

    pub fn write_class(&self, name: &str, super_name: &str, access_flags: u16) -> PathBuf {
        self.write_class_bytes(name, &class_bytes(name, super_name, access_flags))
    }

    pub fn write_class_bytes(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let target = self.classes_dir().join(format!("{}.class", name));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).expect("create package dir");
        }
        fs::write(&target, bytes).expect("write class file");
        target
    }

    pub fn write_jar(&self, file_name: &str, jar: JarBuilder) -> PathBuf {
        jar.write(&self.root().join("deps").join(file_name))
    }

    pub fn write_file(&self, relative: &str, content: &str) -> PathBuf {
        let target = self.root().join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&target, content).expect("write file");
        target
    }
}
