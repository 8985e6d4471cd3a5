use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn tmp_dir() -> PathBuf {
    let dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("clocktone-cli");
    fs::create_dir_all(&dir).ok();
    dir
}

fn create_test_file(name: &str, content: &str) -> PathBuf {
    let path = tmp_dir().join(name);
    fs::write(&path, content).expect("Failed to write test file");
    path
}

fn run_clocktone(args: &[&str]) -> (bool, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_clocktone"))
        .args(args)
        .output()
        .expect("Failed to execute clocktone");

    (
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

#[test]
fn test_encode_writes_wav() {
    let input = create_test_file("encode_in.txt", "1010\n0101\n1100\n");
    let output = tmp_dir().join("encode_out.wav");

    let (ok, stdout, stderr) = run_clocktone(&["encode", input.to_str().unwrap(), output.to_str().unwrap()]);
    assert!(ok, "encode failed: {}", stderr);
    assert!(stdout.contains("Encoded"), "Expected successful encoding but got: {}", stdout);

    let reader = hound::WavReader::open(&output).expect("Output is not a WAV file");
    assert_eq!(reader.spec().sample_rate, 48000);
    assert_eq!(reader.spec().channels, 1);
    // 0.1 s lead-in + 3 x 0.15 s + 0.2 s tail
    assert_eq!(reader.duration(), 36000);
}

#[test]
fn test_encode_decode_round_trip() {
    let symbols = "1010\n0110\n1111\n0000\n1001\n0011\n";
    let input = create_test_file("round_trip_in.txt", symbols);
    let encoded = tmp_dir().join("round_trip.wav");
    let output = tmp_dir().join("round_trip_out.txt");

    let (ok, _, stderr) = run_clocktone(&["encode", input.to_str().unwrap(), encoded.to_str().unwrap()]);
    assert!(ok, "encode failed: {}", stderr);

    let (ok, stdout, stderr) = run_clocktone(&["decode", encoded.to_str().unwrap(), output.to_str().unwrap()]);
    assert!(ok, "decode failed: {}", stderr);
    assert!(stdout.contains("Decoded 6 symbols"), "unexpected output: {}", stdout);

    let decoded = fs::read_to_string(&output).expect("Decoded output file was not created");
    assert_eq!(decoded, symbols);
}

#[test]
fn test_custom_config() {
    let config = create_test_file(
        "config.json",
        r#"{ "channels": [
            { "center": 1500.0, "gain": 0.1 },
            { "center": 1700.0, "gain": 0.1 },
            { "center": 1900.0, "gain": 0.1 },
            { "center": 2100.0, "gain": 0.1 }
        ] }"#,
    );
    let input = create_test_file("custom_in.txt", "10\n01\n11\n");
    let encoded = tmp_dir().join("custom.wav");
    let output = tmp_dir().join("custom_out.txt");
    let config = config.to_str().unwrap();

    let (ok, _, stderr) = run_clocktone(&["--config", config, "encode", input.to_str().unwrap(), encoded.to_str().unwrap()]);
    assert!(ok, "encode failed: {}", stderr);
    let (ok, _, stderr) = run_clocktone(&["--config", config, "decode", encoded.to_str().unwrap(), output.to_str().unwrap()]);
    assert!(ok, "decode failed: {}", stderr);

    assert_eq!(fs::read_to_string(&output).unwrap(), "10\n01\n11\n");
}

#[test]
fn test_symbol_length_mismatch_fails() {
    let input = create_test_file("bad_len.txt", "101\n");
    let output = tmp_dir().join("bad_len.wav");

    let (ok, _, stderr) = run_clocktone(&["encode", input.to_str().unwrap(), output.to_str().unwrap()]);
    assert!(!ok, "encode should reject a 3-bit symbol");
    assert!(stderr.contains("WrongLength"), "unexpected error: {}", stderr);
}

#[test]
fn test_huge_tail_fails_cleanly() {
    let input = create_test_file("huge_tail_in.txt", "1010\n");
    let output = tmp_dir().join("huge_tail.wav");

    let (ok, _, stderr) = run_clocktone(&[
        "encode",
        input.to_str().unwrap(),
        output.to_str().unwrap(),
        "--tail",
        "1e12",
    ]);
    assert!(!ok, "encode should reject a 1e12 s tail");
    assert!(stderr.contains("InvalidInputRange"), "unexpected error: {}", stderr);
    assert!(!stderr.contains("panicked"), "encode panicked: {}", stderr);
}

#[test]
fn test_timeline_prints_json() {
    let input = create_test_file("timeline_in.txt", "1000\n");

    let (ok, stdout, stderr) = run_clocktone(&["timeline", input.to_str().unwrap(), "--start", "1.0"]);
    assert!(ok, "timeline failed: {}", stderr);

    let json: serde_json::Value = serde_json::from_str(&stdout).expect("timeline output is not JSON");
    assert_eq!(json["start_time"], 1.0);
    let channels = json["channels"].as_array().unwrap();
    assert_eq!(channels.len(), 6);
    // clock: rise, fall, stop
    assert_eq!(channels[0]["setpoints"].as_array().unwrap().len(), 3);
}

#[test]
fn test_config_prints_defaults() {
    let (ok, stdout, _) = run_clocktone(&["config"]);
    assert!(ok);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["transform_block_size"], 2048);
    assert_eq!(json["channels"].as_array().unwrap().len(), 6);
}
