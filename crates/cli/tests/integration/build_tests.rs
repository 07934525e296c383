//! Build pipeline integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn plain_build_with_archive() {
  let env = TestEnv::gcc();

  env
    .cmd()
    .args(["-z", "linux"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Built plain (no-pgo)"));

  assert!(env.path("dist/mujs").is_file());
  assert!(env.path("mujs-linux.tar.gz").is_file());

  let make_log = env.read("mujs/make.log");
  assert!(make_log.contains("-j2 CC="));
  assert!(!make_log.contains("-fprofile"));
}

#[test]
fn gcc_pgo_trains_then_optimizes() {
  let env = TestEnv::gcc();

  env
    .cmd()
    .arg("--pgo")
    .assert()
    .success()
    .stdout(predicate::str::contains("Built pgo (optimized)"))
    .stdout(predicate::str::contains("8/8 runs succeeded"));

  assert!(env.path("dist-pgo/mujs-pgo").is_file());
  assert_eq!(env.read("mujs/runs.log").lines().count(), 8);
  assert!(env.path("pgo-profile/mujs.gcda").is_file());

  let make_log = env.read("mujs/make.log");
  let generate = make_log.find("-fprofile-generate=").unwrap();
  let use_profile = make_log.find("-fprofile-use=").unwrap();
  assert!(generate < use_profile);
  assert!(make_log.contains("-fprofile-correction"));
}

#[test]
fn custom_training_runs_and_script() {
  let env = TestEnv::gcc();
  let script = env.temp.path().join("bench.js");
  std::fs::write(&script, "print('bench')").unwrap();

  env
    .cmd()
    .args(["--pgo", "--training-runs", "3", "--training-script"])
    .arg(&script)
    .assert()
    .success();

  let runs = env.read("mujs/runs.log");
  assert_eq!(runs.lines().count(), 3);
  assert!(runs.lines().all(|l| l.ends_with("bench.js")));
}

#[test]
fn clang_without_profdata_degrades() {
  let env = TestEnv::with_compiler("clang version 17.0.6");

  env
    .cmd()
    .arg("--pgo")
    .assert()
    .success()
    .stdout(predicate::str::contains("degraded"))
    .stderr(predicate::str::contains("Profile-guided optimization skipped"));

  assert!(env.path("dist-pgo/mujs-pgo").is_file());
  assert!(!env.path("mujs/runs.log").exists());

  let make_log = env.read("mujs/make.log");
  assert!(!make_log.contains("-fprofile-instr-generate"));
  assert!(make_log.contains("-funroll-loops"));
}

#[test]
fn clang_with_profdata_merges_profiles() {
  let env = TestEnv::with_compiler("clang version 17.0.6");
  env.tool(
    "llvm-profdata",
    r#"echo "$*" > "$(dirname "$0")/merge.log"
for a in "$@"; do case "$a" in -output=*) : > "${a#-output=}";; esac; done"#,
  );

  env
    .cmd()
    .arg("--pgo")
    .assert()
    .success()
    .stdout(predicate::str::contains("Built pgo (optimized)"));

  let merge_log = std::fs::read_to_string(env.bin.join("merge.log")).unwrap();
  assert!(merge_log.starts_with("merge -output="));
  assert!(merge_log.contains(".profraw"));
  assert!(env.read("mujs/make.log").contains("-fprofile-instr-use="));
}

#[test]
fn pgo_mimalloc_ships_preload_wrapper() {
  let env = TestEnv::gcc().with_cmake();

  env.cmd().args(["--pgo-mimalloc", "-z", "x"]).assert().success();

  let dist = env.path("dist-pgo-mimalloc");
  assert!(dist.join("mujs-pgo-mimalloc").is_file());
  let wrapper = std::fs::read_to_string(dist.join("mujs-pgo-mimalloc.sh")).unwrap();
  assert!(wrapper.contains(r#"exec "$here/mujs-pgo-mimalloc" "$@""#));
  assert!(env.path("mujs-pgo-mimalloc-x.tar.gz").is_file());

  let cmake_log = env.read("cmake.log");
  assert!(cmake_log.contains("--parallel 2"));
  assert!(env.read("mujs/make.log").contains("-I"));
}

#[test]
fn static_mimalloc_links_override_object() {
  let env = TestEnv::gcc().with_cmake();

  env.cmd().args(["--mimalloc", "--static-mimalloc"]).assert().success();

  assert!(env.path("dist-mimalloc/mujs-mimalloc").is_file());
  assert!(!env.path("dist-mimalloc/mujs-mimalloc.sh").exists());
  assert!(env.read("mujs/make.log").contains("mimalloc.o"));
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn stale_output_is_replaced() {
  let env = TestEnv::gcc();
  std::fs::create_dir_all(env.path("dist")).unwrap();
  std::fs::write(env.path("dist/old-binary"), "stale").unwrap();

  env.cmd().assert().success();

  assert!(!env.path("dist/old-binary").exists());
  assert!(env.path("dist/mujs").is_file());
}

#[test]
fn repeated_runs_produce_same_names() {
  let env = TestEnv::gcc();

  env.cmd().args(["--pgo", "-z", "tag"]).assert().success();
  env.cmd().args(["--pgo", "-z", "tag"]).assert().success();

  let entries: Vec<_> = std::fs::read_dir(env.path("dist-pgo"))
    .unwrap()
    .map(|e| e.unwrap().file_name().into_string().unwrap())
    .collect();
  assert_eq!(entries, vec!["mujs-pgo"]);
  assert!(env.path("mujs-pgo-tag.tar.gz").is_file());
}

#[test]
fn failed_training_runs_do_not_abort() {
  let env = TestEnv::gcc();
  std::fs::write(env.path("mujs/fail-training"), "").unwrap();

  env
    .cmd()
    .arg("--pgo")
    .assert()
    .success()
    .stderr(predicate::str::contains("8 of 8 training runs failed"))
    .stdout(predicate::str::contains("degraded"));

  assert!(env.path("dist-pgo/mujs-pgo").is_file());
}

#[test]
fn refresh_failure_uses_existing_checkout() {
  let env = TestEnv::gcc();

  env
    .cmd()
    .args(["--repo", "https://invalid.example/mujs.git"])
    .assert()
    .success()
    .stderr(predicate::str::contains("Using existing mujs checkout"));
}

#[test]
fn json_summary() {
  let env = TestEnv::gcc();

  let output = env.cmd().args(["--pgo", "--format", "json"]).output().unwrap();
  assert!(output.status.success());

  let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(summary["variant"], "pgo");
  assert_eq!(summary["compiler_family"], "gcc");
  assert_eq!(summary["pgo"]["terminal"]["state"], "optimized");
  assert_eq!(summary["pgo"]["training"]["attempted"], 8);
}

#[test]
fn info_reports_toolchain() {
  let env = TestEnv::gcc();

  env
    .cmd()
    .arg("--info")
    .assert()
    .success()
    .stdout(predicate::str::contains("gcc (GCC) 13.2.0"));

  assert!(!env.path("mujs/make.log").exists());
}

// =============================================================================
// Fatal errors
// =============================================================================

#[test]
fn missing_compiler_is_fatal() {
  let env = TestEnv::gcc();
  std::fs::remove_file(env.bin.join("cc")).unwrap();

  env
    .cmd()
    .assert()
    .code(1)
    .stderr(predicate::str::contains("'cc' not found"));

  assert!(!env.path("dist").exists());
}

#[test]
fn missing_cmake_is_fatal_with_allocator() {
  let env = TestEnv::gcc();

  env
    .cmd()
    .arg("--mimalloc")
    .assert()
    .failure()
    .stderr(predicate::str::contains("'cmake' not found"));
}

#[test]
fn compile_failure_names_stage() {
  let env = TestEnv::gcc();
  env.tool("make", "[ \"$1\" = \"clean\" ] && exit 0\necho 'mujs.c:1: error: boom' >&2\nexit 2");

  env
    .cmd()
    .assert()
    .code(1)
    .stderr(predicate::str::contains("baseline build failed"))
    .stderr(predicate::str::contains("boom"));
}

#[test]
fn clone_failure_is_fatal() {
  let env = TestEnv::gcc();
  std::fs::remove_dir_all(env.path("mujs")).unwrap();
  let missing = env.temp.path().join("no-such-repo");

  env
    .cmd()
    .arg("--repo")
    .arg(&missing)
    .assert()
    .code(1)
    .stderr(predicate::str::contains("failed to clone"));

  assert!(!env.path("mujs").exists());
}
