//! Shell-script stand-ins for the real worker.
//!
//! Every fake lives in its own temp directory with a `scripts/` dir (the
//! worker's working directory) and a `scratch/` dir for per-request files.
//! Scripts are run as `sh <script> <args>`.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use pixelart::config::WorkerConfig;
use tempfile::TempDir;

use crate::builders::WorkerConfigBuilder;

/// Parses the file-mode command line into `$input`, `$output`, `$progress`.
const PARSE_FILE_ARGS: &str = r#"
input="$1"; shift
output=""
progress=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) output="$2"; shift 2 ;;
    --progress-file) progress="$2"; shift 2 ;;
    *) shift ;;
  esac
done
"#;

/// Copies input to output, reporting 10 -> 60 -> 100.
pub const COPY_WITH_PROGRESS: &str = r#"
echo '{"progress": 10, "message": "loading"}' > "$progress"
sleep 0.2
echo '{"progress": 60, "message": "quantizing", "timestamp": 1718000000.5}' > "$progress"
sleep 0.2
cp "$input" "$output"
echo '{"progress": 100, "message": "done"}' > "$progress"
"#;

/// Reports 50, goes quiet for a second, then finishes.
pub const STALL_THEN_FINISH: &str = r#"
echo '{"progress": 50}' > "$progress"
sleep 1
echo '{"progress": 90}' > "$progress"
cp "$input" "$output"
"#;

/// Writes malformed progress, then valid progress, then finishes.
pub const GARBLED_PROGRESS: &str = r#"
printf '{"progress": ' > "$progress"
sleep 0.2
echo '{"progress": 70}' > "$progress"
sleep 0.2
cp "$input" "$output"
"#;

pub const FAIL_WITH_STDERR: &str = r#"
echo "bad palette" >&2
exit 2
"#;

pub const FAIL_SILENTLY: &str = "exit 5\n";

/// Exits 0 without writing an output file.
pub const NO_OUTPUT: &str = "exit 0\n";

/// Exits 0 without an output file but explains why on stderr.
pub const NO_OUTPUT_WITH_STDERR: &str = r#"
echo "palette file missing" >&2
exit 0
"#;

/// Fails, leaving a background child holding stdout and stderr open.
pub const FAIL_LEAVING_CHILD: &str = r#"
echo "bad palette" >&2
sleep 10 &
exit 2
"#;

/// Echoes stdin back on stdout.
pub const PIPE_ECHO: &str = "exec cat\n";

pub const PIPE_FAIL: &str = r#"
cat > /dev/null
echo "pipe broke" >&2
exit 3
"#;

pub const PIPE_EMPTY: &str = "cat > /dev/null\nexit 0\n";

pub const PIPE_EMPTY_WITH_STDERR: &str = r#"
cat > /dev/null
echo "unsupported color mode" >&2
exit 0
"#;

pub const PIPE_GARBAGE: &str = "cat > /dev/null\necho 'not a png'\n";

/// Answers palette queries.
pub const PALETTES: &str = r#"
case "$1" in
  --list-palettes) echo '{"default": "Default palette", "gameboy": "Four greens"}' ;;
  --get-palette-colors) echo '[[15,56,15],[48,98,48],[139,172,15]]' ;;
  *) exit 1 ;;
esac
"#;

/// A stand-in for the runtime itself (`python`): answers `--version` and
/// `-m pip install -r <file>`, runs anything else through `sh`.
pub const FAKE_RUNTIME: &str = r#"
case "$1" in
  --version) echo "Python 3.12.1"; exit 0 ;;
  -m)
    if [ "$2" = "pip" ] && [ "$3" = "install" ] && [ "$4" = "-r" ] && [ -f "$5" ]; then
      echo "Collecting pillow"
      echo "option is deprecated" >&2
      echo "Successfully installed pillow"
      exit 0
    fi
    echo "bad pip invocation" >&2
    exit 1 ;;
  *) exec /bin/sh "$@" ;;
esac
"#;

pub struct FakeWorker {
    dir: TempDir,
}

impl FakeWorker {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create fake worker dir");
        fs::create_dir_all(dir.path().join("scripts")).expect("create scripts dir");
        fs::create_dir_all(dir.path().join("scratch")).expect("create scratch dir");
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.dir.path().join("scripts")
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.dir.path().join("scratch")
    }

    /// Write `scripts/<name>` running `body`.
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.scripts_dir().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write fake script");
        path
    }

    /// Write a file-mode worker: `body` sees `$input`, `$output`, `$progress`.
    pub fn file_worker(&self, name: &str, body: &str) -> PathBuf {
        self.script(name, &format!("{PARSE_FILE_ARGS}{body}"))
    }

    /// A worker that records its pid in `pid_file` and then hangs.
    pub fn hanging_worker(&self, name: &str, pid_file: &Path) -> PathBuf {
        self.script(
            name,
            &format!("echo $$ > '{}'\nexec sleep 30\n", pid_file.display()),
        )
    }

    /// A worker that writes each argument on its own line to `out`, then
    /// behaves like [`COPY_WITH_PROGRESS`].
    pub fn recording_worker(&self, name: &str, out: &Path) -> PathBuf {
        let record = format!("printf '%s\\n' \"$@\" > '{}'\n", out.display());
        self.script(name, &format!("{record}{PARSE_FILE_ARGS}cp \"$input\" \"$output\"\n"))
    }

    /// Write an executable `<root>/bin/<name>` behaving like [`FAKE_RUNTIME`].
    pub fn fake_runtime(&self, name: &str) -> PathBuf {
        let bin = self.dir.path().join("bin");
        fs::create_dir_all(&bin).expect("create bin dir");
        let path = bin.join(name);
        fs::write(&path, format!("#!/bin/sh\n{FAKE_RUNTIME}")).expect("write fake runtime");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod fake runtime");
        path
    }

    /// Config running `sh scripts/<script>`.
    pub fn config(&self, script: &str) -> WorkerConfig {
        self.builder().worker_script(script).palette_script(script).build()
    }

    pub fn builder(&self) -> WorkerConfigBuilder {
        WorkerConfigBuilder::new(&self.scripts_dir(), &self.scratch_dir())
    }

    /// Files currently in the scratch directory.
    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        match fs::read_dir(self.scratch_dir()) {
            Ok(entries) => entries.filter_map(|e| e.ok().map(|e| e.path())).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Default for FakeWorker {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a process with `pid` is still alive (and not a zombie).
pub fn process_alive(pid: u32) -> bool {
    match fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => {
            // State is the field after the parenthesised command name.
            let state = stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next());
            !matches!(state, Some("Z") | Some("X") | None)
        }
        Err(_) => false,
    }
}
