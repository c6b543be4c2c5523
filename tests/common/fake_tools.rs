//! Fake `vastai`, `ssh`, and `scp` executables for CLI tests.
//!
//! Integration tests are compiled as separate crates, so this file is shared
//! via `#[path = "common/fake_tools.rs"] mod fake_tools;`.

use std::fs;
use std::os::unix::fs::PermissionsExt;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

/// Instance identifier the fake marketplace hands out.
pub const FAKE_INSTANCE_ID: &str = "4242";

const VASTAI_SCRIPT: &str = r#"#!/bin/sh
echo "$*" >> "$FAKE_VASTAI_LOG"
if [ "$1" = "$FAKE_VASTAI_FAIL" ]; then
  echo "simulated $1 failure" >&2
  exit 1
fi
case "$1" in
  search)
    printf '%s' '[{"ask_contract_id": 9001, "machine_id": 77, "dph_total": 0.35, "disk_space": 128.0, "num_gpus": 1, "gpu_name": "RTX 4090", "geolocation": "Taiwan, TW"}]'
    ;;
  create)
    printf '%s' '{"success": true, "new_contract": 4242}'
    ;;
  show)
    printf '%s' '[{"id": 4242, "actual_status": "running"}]'
    ;;
  ssh-url)
    echo "ssh://root@127.0.0.1:2222"
    ;;
  scp-url)
    echo "scp://root@127.0.0.1:2222"
    ;;
  destroy)
    echo "destroying instance $3."
    ;;
  *)
    exit 2
    ;;
esac
"#;

const SCP_SCRIPT: &str = r#"#!/bin/sh
for last; do :; done
case "$last" in
  *:*) exit 0 ;;
  *) printf 'pp512 | 1234.5 t/s\n' > "$last" ;;
esac
"#;

const SSH_SCRIPT: &str = r#"#!/bin/sh
for last; do :; done
case "$last" in
  *tee*)
    echo "payload progress: building llama.cpp"
    echo "payload warning: ccache missing" >&2
    ;;
esac
exit 0
"#;

/// Temporary working directory with fake tools and payload files.
pub struct FakeTools {
    _tmp: TempDir,
    pub root: Utf8PathBuf,
}

impl FakeTools {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
            .unwrap_or_else(|path| panic!("tempdir should be utf8: {}", path.display()));
        let tools = Self { _tmp: tmp, root };
        fs::create_dir(tools.root.join("bin")).unwrap_or_else(|err| panic!("bin dir: {err}"));
        write_executable(&tools.bin("vastai"), VASTAI_SCRIPT);
        write_executable(&tools.bin("scp"), SCP_SCRIPT);
        write_executable(&tools.bin("ssh"), SSH_SCRIPT);
        tools.write("patch.diff", "diff --git a/x b/x\n");
        tools.write("setup_script.sh", "#!/bin/sh\n");
        tools
    }

    pub fn bin(&self, name: &str) -> Utf8PathBuf {
        self.root.join("bin").join(name)
    }

    pub fn write(&self, name: &str, contents: &str) {
        fs::write(self.root.join(name), contents)
            .unwrap_or_else(|err| panic!("write {name}: {err}"));
    }

    pub fn remove(&self, name: &str) {
        fs::remove_file(self.root.join(name)).unwrap_or_else(|err| panic!("remove {name}: {err}"));
    }

    pub fn vastai_log(&self) -> Utf8PathBuf {
        self.root.join("vastai-calls.log")
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.root.join(name)).unwrap_or_default()
    }

    pub fn vastai_calls(&self) -> Vec<String> {
        fs::read_to_string(self.vastai_log())
            .unwrap_or_default()
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

fn write_executable(path: &Utf8Path, contents: &str) {
    fs::write(path, contents).unwrap_or_else(|err| panic!("write {path}: {err}"));
    let mut permissions = fs::metadata(path)
        .unwrap_or_else(|err| panic!("stat {path}: {err}"))
        .permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions).unwrap_or_else(|err| panic!("chmod {path}: {err}"));
}
