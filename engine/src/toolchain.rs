use std::{
    collections::HashMap,
    env,
    path::{Path, PathBuf},
};

use lazy_regex::regex_captures;

use crate::error::{Error, Result};
use crate::model::Language;

/// Entry-point class name used when a JVM source declares no class at all.
pub const DEFAULT_JVM_ENTRY_POINT: &str = "Main";

/// Command templates for one execution: an optional compile step producing a
/// workspace-local artifact, then a run step. Both are argument vectors;
/// submitted source never passes through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlan {
    pub compile: Option<Vec<String>>,
    pub run: Vec<String>,
}

/// Read-only view of which toolchain executables exist on this host.
///
/// Probed once at engine construction; concurrent evaluations share it by
/// reference and never mutate it.
#[derive(Debug, Clone)]
pub struct ToolchainRegistry {
    resolved: HashMap<&'static str, PathBuf>,
}

impl ToolchainRegistry {
    const PROBED_BINARIES: &'static [&'static str] =
        &["python3", "python", "javac", "java", "node", "gcc", "g++"];

    pub fn probe() -> Self {
        let mut resolved = HashMap::new();
        for &bin in Self::PROBED_BINARIES {
            if let Some(path) = find_in_path(bin) {
                log::debug!("Toolchain probe: {} -> {}", bin, path.to_string_lossy());
                resolved.insert(bin, path);
            }
        }
        Self { resolved }
    }

    /// Registry that resolves nothing; used by tests for the degraded path.
    pub fn empty() -> Self {
        Self {
            resolved: HashMap::new(),
        }
    }

    pub fn is_available(&self, language: Language) -> bool {
        self.ensure_available(language).is_ok()
    }

    /// Fails with the first missing binary, before any workspace is created
    /// or process spawned.
    pub fn ensure_available(&self, language: Language) -> Result<()> {
        for &bin in self.required_binaries(language) {
            if self.lookup(bin).is_none() {
                return Err(Error::ToolchainUnavailable {
                    language,
                    binary: bin,
                });
            }
        }
        Ok(())
    }

    fn required_binaries(&self, language: Language) -> &'static [&'static str] {
        use Language::*;
        match language {
            Python => &["python3"],
            Java => &["javac", "java"],
            Javascript => &["node"],
            C => &["gcc"],
            Cpp => &["g++"],
            // SQL runs in-process against an in-memory store.
            Sql => &[],
        }
    }

    fn lookup(&self, bin: &'static str) -> Option<&Path> {
        match self.resolved.get(bin) {
            Some(path) => Some(path),
            // Hosts that ship only `python` without the `python3` alias.
            None if bin == "python3" => self.resolved.get("python").map(PathBuf::as_path),
            None => None,
        }
    }

    fn require(&self, language: Language, bin: &'static str) -> Result<String> {
        self.lookup(bin)
            .map(|p| p.to_string_lossy().into_owned())
            .ok_or(Error::ToolchainUnavailable {
                language,
                binary: bin,
            })
    }

    /// Builds the compile/run command plan for `language` against a source
    /// file inside the workspace. Fails with `ToolchainUnavailable` before
    /// any process is spawned if a required binary is missing.
    pub fn plan(
        &self,
        language: Language,
        workspace_dir: &Path,
        source_file: &Path,
    ) -> Result<CommandPlan> {
        use Language::*;
        let src = source_file.to_string_lossy().into_owned();
        let dir = workspace_dir.to_string_lossy().into_owned();

        let plan = match language {
            Python => CommandPlan {
                compile: None,
                run: vec![self.require(language, "python3")?, src],
            },
            Javascript => CommandPlan {
                compile: None,
                run: vec![self.require(language, "node")?, src],
            },
            Java => {
                let javac = self.require(language, "javac")?;
                let java = self.require(language, "java")?;
                let class_name = source_file
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| DEFAULT_JVM_ENTRY_POINT.to_owned());
                CommandPlan {
                    compile: Some(vec![javac, src]),
                    run: vec![java, "-cp".to_owned(), dir, class_name],
                }
            }
            C | Cpp => {
                let compiler = if language == C { "gcc" } else { "g++" };
                let cc = self.require(language, compiler)?;
                let artifact = workspace_dir.join(artifact_name());
                let artifact = artifact.to_string_lossy().into_owned();
                CommandPlan {
                    compile: Some(vec![cc, src, "-o".to_owned(), artifact.clone()]),
                    run: vec![artifact],
                }
            }
            Sql => CommandPlan {
                compile: None,
                run: Vec::new(),
            },
        };
        Ok(plan)
    }
}

fn artifact_name() -> &'static str {
    if cfg!(windows) {
        "a.exe"
    } else {
        "a.out"
    }
}

fn find_in_path(bin: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    for dir in env::split_paths(&paths) {
        let candidate = dir.join(bin);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{}.exe", bin));
            if exe.is_file() {
                return Some(exe);
            }
        }
    }
    None
}

/// Derives the source file name for a submission.
///
/// JVM sources must be named after their public class, so the entry point is
/// detected by inspecting the source; everything else gets a fixed name.
pub fn source_filename(language: Language, source: &str) -> String {
    match language {
        Language::Java => format!("{}.java", detect_jvm_entry_point(source)),
        _ => format!("code.{}", language.file_extension()),
    }
}

pub fn detect_jvm_entry_point(source: &str) -> &str {
    if let Some((_, name)) = regex_captures!(r"public\s+class\s+(\w+)", source) {
        return name;
    }
    if let Some((_, name)) = regex_captures!(r"\bclass\s+(\w+)", source) {
        return name;
    }
    DEFAULT_JVM_ENTRY_POINT
}
