use contagium::config::Config;
use contagium::engine::Engine;
use std::{fs, path::PathBuf, process::Command};

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[model]\n"
        + "beta = 1.0\n"
        + "incubation_mean = 5.0\n"
        + "incubation_std = 2.0\n"
        + "infectious_mean = 7.0\n"
        + "infectious_std = 3.0\n"
        + "mortality_rate = 0.02\n"
        + "vax_rate = 0.001\n"
        + "detection_prob = 0.5\n"
        + "isolation_compliance = 0.8\n"
        + "interaction_radius = 2.0\n"
        + "dt = 0.5\n"
        + "\n"
        + "[mobility]\n"
        + "home_attraction = 0.05\n"
        + "random_force = 1.0\n"
        + "\n"
        + "[init]\n"
        + "n_agt = 120\n"
        + "grid_size = 50.0\n"
        + "\n"
        + "[output]\n"
        + "steps_per_save = 8\n"
        + "saves_per_file = 4\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    fn run_bin(args: &[&str]) {
        let bin = PathBuf::from(env!("CARGO_BIN_EXE_contagium"));

        let output = Command::new(bin)
            .args(args)
            .output()
            .expect("failed to execute command");

        let stdout_str =
            std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
        let stderr_str =
            std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

        assert!(
            output.status.success(),
            "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
        );
    }

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "create"]);
    run_bin(&["--sim-dir", test_dir_str, "create"]);

    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "0"]);
    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "0"]);

    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "1"]);
    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "1"]);

    assert!(test_dir.join("run-0000/trajectory-0002.msgpack").is_file());
    assert!(test_dir.join("run-0001/checkpoint.msgpack").is_file());

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);

    assert!(test_dir.join("run-0000/results.json").is_file());
    assert!(test_dir.join("run-0001/results.json").is_file());

    run_bin(&["--sim-dir", test_dir_str, "clean"]);

    assert!(!test_dir.join("run-0000").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn checkpoint_round_trip_resumes_identically() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("checkpoint_round_trip");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let mut cfg = Config::default();
    cfg.init.n_agt = 80;
    cfg.init.grid_size = 40.0;

    let mut engine = Engine::from_seed(cfg, 42).expect("failed to construct engine");
    for _ in 0..20 {
        engine.step().expect("failed to step");
    }

    let checkpoint = test_dir.join("checkpoint.msgpack");
    engine
        .save_checkpoint(&checkpoint)
        .expect("failed to save checkpoint");

    let mut resumed = Engine::load_checkpoint(&checkpoint).expect("failed to load checkpoint");
    assert_eq!(resumed.cfg(), engine.cfg());
    assert_eq!(resumed.counts_history(), engine.counts_history());
    assert_eq!(resumed.rt_history(), engine.rt_history());

    // The RNG state is part of the checkpoint: both engines must continue
    // on the identical stream.
    for _ in 0..20 {
        engine.step().expect("failed to step");
        resumed.step().expect("failed to step resumed engine");
    }
    assert_eq!(resumed.counts_history(), engine.counts_history());
    assert_eq!(resumed.rt_history(), engine.rt_history());

    fs::remove_dir_all(&test_dir).ok();
}
