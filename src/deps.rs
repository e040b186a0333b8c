//! External dependency extraction.
//!
//! [`ImportScanner`] is a line-oriented, best-effort heuristic: it matches
//! `import X` and `from X import Y` at the very start of a line and keeps the
//! top-level module name. It is not a parser. Indented (conditional) imports,
//! imports after `;`, dynamic `__import__`/`importlib` use and the second name
//! of `import a, b` are not seen. Relative imports (`from . import x`) never
//! match. The [`DependencyExtractor`] trait is the seam for a real parser.

use crate::error::Result;
use crate::file::SourceFile;
use crate::writer::write_file_atomic;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?:import|from)\s+([a-zA-Z0-9_]+)").expect("import pattern is valid")
});

/// Module names shipped with CPython 3.x (stdlib and compiled-in modules).
static STDLIB_MODULES: &[&str] = &[
    "__future__", "_abc", "_ast", "_asyncio", "_bisect", "_blake2", "_bz2", "_codecs",
    "_collections", "_collections_abc", "_contextvars", "_csv", "_ctypes", "_datetime",
    "_decimal", "_functools", "_hashlib", "_heapq", "_imp", "_io", "_json", "_locale",
    "_lzma", "_md5", "_multiprocessing", "_opcode", "_operator", "_pickle", "_posixsubprocess",
    "_queue", "_random", "_sha1", "_sha256", "_sha3", "_sha512", "_signal", "_socket",
    "_sqlite3", "_sre", "_ssl", "_stat", "_statistics", "_string", "_struct", "_symtable",
    "_thread", "_threading_local", "_tokenize", "_tracemalloc", "_typing", "_warnings",
    "_weakref", "_weakrefset", "_winapi", "_zoneinfo", "abc", "aifc", "antigravity",
    "argparse", "array", "ast", "asynchat", "asyncio", "asyncore", "atexit", "audioop",
    "base64", "bdb", "binascii", "bisect", "builtins", "bz2", "cProfile", "calendar", "cgi",
    "cgitb", "chunk", "cmath", "cmd", "code", "codecs", "codeop", "collections", "colorsys",
    "compileall", "concurrent", "configparser", "contextlib", "contextvars", "copy",
    "copyreg", "crypt", "csv", "ctypes", "curses", "dataclasses", "datetime", "dbm",
    "decimal", "difflib", "dis", "distutils", "doctest", "email", "encodings", "ensurepip",
    "enum", "errno", "faulthandler", "fcntl", "filecmp", "fileinput", "fnmatch", "fractions",
    "ftplib", "functools", "gc", "genericpath", "getopt", "getpass", "gettext", "glob",
    "graphlib", "grp", "gzip", "hashlib", "heapq", "hmac", "html", "http", "idlelib",
    "imaplib", "imghdr", "imp", "importlib", "inspect", "io", "ipaddress", "itertools",
    "json", "keyword", "lib2to3", "linecache", "locale", "logging", "lzma", "mailbox",
    "mailcap", "marshal", "math", "mimetypes", "mmap", "modulefinder", "msilib", "msvcrt",
    "multiprocessing", "netrc", "nis", "nntplib", "ntpath", "nturl2path", "numbers", "opcode",
    "operator", "optparse", "os", "ossaudiodev", "pathlib", "pdb", "pickle", "pickletools",
    "pipes", "pkgutil", "platform", "plistlib", "poplib", "posix", "posixpath", "pprint",
    "profile", "pstats", "pty", "pwd", "py_compile", "pyclbr", "pydoc", "pydoc_data",
    "pyexpat", "queue", "quopri", "random", "re", "readline", "reprlib", "resource",
    "rlcompleter", "runpy", "sched", "secrets", "select", "selectors", "shelve", "shlex",
    "shutil", "signal", "site", "smtpd", "smtplib", "sndhdr", "socket", "socketserver",
    "spwd", "sqlite3", "sre_compile", "sre_constants", "sre_parse", "ssl", "stat",
    "statistics", "string", "stringprep", "struct", "subprocess", "sunau", "symtable", "sys",
    "sysconfig", "syslog", "tabnanny", "tarfile", "telnetlib", "tempfile", "termios",
    "textwrap", "this", "threading", "time", "timeit", "tkinter", "token", "tokenize",
    "tomllib", "trace", "traceback", "tracemalloc", "tty", "turtle", "turtledemo", "types",
    "typing", "unicodedata", "unittest", "urllib", "uu", "uuid", "venv", "warnings", "wave",
    "weakref", "webbrowser", "winreg", "winsound", "wsgiref", "xdrlib", "xml", "xmlrpc",
    "xxsubtype", "zipapp", "zipfile", "zipimport", "zlib", "zoneinfo",
];

/// Capability of deriving the external dependencies of a set of files.
pub trait DependencyExtractor {
    /// Returns the deduplicated, lexicographically sorted external module names.
    fn extract(&self, files: &[SourceFile]) -> Vec<String>;
}

/// Regex-based import scanner filtering against a standard-library name set.
#[derive(Debug, Clone)]
pub struct ImportScanner {
    stdlib: HashSet<String>,
}

impl ImportScanner {
    /// Creates a scanner whose stdlib set is the built-in list plus `extra`.
    #[must_use]
    pub fn new(extra: &[String]) -> Self {
        let stdlib = STDLIB_MODULES
            .iter()
            .map(ToString::to_string)
            .chain(extra.iter().cloned())
            .collect();
        Self { stdlib }
    }

    /// Returns true if `module` is treated as standard library.
    #[must_use]
    pub fn is_stdlib(&self, module: &str) -> bool {
        self.stdlib.contains(module)
    }

    /// Yields the top-level module names imported by `content`.
    pub fn imports(content: &str) -> impl Iterator<Item = &str> {
        IMPORT_RE
            .captures_iter(content)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
    }
}

impl Default for ImportScanner {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl DependencyExtractor for ImportScanner {
    fn extract(&self, files: &[SourceFile]) -> Vec<String> {
        let requirements: BTreeSet<&str> = files
            .iter()
            .flat_map(|file| Self::imports(&file.content))
            .filter(|module| !self.is_stdlib(module))
            .collect();

        requirements.into_iter().map(ToString::to_string).collect()
    }
}

/// Writes `requirements.txt`: one name per line, no trailing newline.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_requirements(path: &Path, requirements: &[String], backup: bool) -> Result<()> {
    write_file_atomic(path, &requirements.join("\n"), backup)
}
