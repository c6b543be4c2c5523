//! Unit tests for the `vastbench` CLI binary implementation.

use super::*;
use rstest::{fixture, rstest};
use vastbench::transport::TransportSettings;

#[fixture]
fn config() -> VastbenchConfig {
    VastbenchConfig {
        vastai_bin: String::from("vastai"),
        ssh_bin: String::from("ssh"),
        scp_bin: String::from("scp"),
        image: String::from("vastai/base-image:cuda-12.8.1-auto"),
        poll_interval_secs: 5,
        ready_timeout_secs: 1800,
        ssh_batch_mode: true,
        ssh_strict_host_key_checking: false,
        ssh_known_hosts_file: String::from("/dev/null"),
        ssh_identity_file: None,
        patch_file: String::from("patch.diff"),
        setup_script: String::from("setup_script.sh"),
        remote_log_file: String::from("setup_output.log"),
        remote_results_path: String::from("~/llama.cpp/results.out.txt"),
        local_results_path: String::from("vastai_results.txt"),
        log_file: String::from("vastbench.log"),
    }
}

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("vastbench").chain(args.iter().copied()))
        .unwrap_or_else(|err| panic!("arguments should parse: {err}"))
}

#[rstest]
fn defaults_launch_a_new_instance(config: VastbenchConfig) {
    let plan = build_plan(&parse(&[]), &config);

    assert_eq!(
        plan.provisioning,
        Provisioning::Launch {
            query: OfferQuery {
                gpu_type: String::from("RTX_4090"),
                num_gpus: 1,
                region: Some(String::from("Asia")),
            },
            min_disk_gb: 32.0,
            image: String::from("vastai/base-image:cuda-12.8.1-auto"),
        }
    );
    assert!(plan.cleanup);
    assert_eq!(plan.payload_files.len(), 2);
    assert_eq!(plan.results.remote, "~/llama.cpp/results.out.txt");
}

#[rstest]
fn flags_override_the_offer_query(config: VastbenchConfig) {
    let cli = parse(&[
        "--gpu-type",
        "H100_SXM",
        "--num-gpus",
        "8",
        "--disk-size",
        "100.5",
        "--region",
        "Europe",
        "--no-cleanup",
    ]);
    let plan = build_plan(&cli, &config);

    let Provisioning::Launch {
        query,
        min_disk_gb,
        ..
    } = plan.provisioning
    else {
        panic!("expected a launch plan");
    };
    assert_eq!(query.gpu_type, "H100_SXM");
    assert_eq!(query.num_gpus, 8);
    assert_eq!(query.region.as_deref(), Some("Europe"));
    assert_eq!(min_disk_gb, 100.5);
    assert!(!plan.cleanup);
}

#[rstest]
fn instance_id_attaches_to_existing_instance(config: VastbenchConfig) {
    let plan = build_plan(&parse(&["--instance-id", " 12345 "]), &config);

    assert_eq!(
        plan.provisioning,
        Provisioning::Attach(InstanceId::new("12345"))
    );
    assert!(plan.cleanup);
}

#[rstest]
fn blank_instance_id_launches(config: VastbenchConfig) {
    let plan = build_plan(&parse(&["--instance-id", "  "]), &config);

    assert!(matches!(plan.provisioning, Provisioning::Launch { .. }));
}

#[rstest]
#[case::zero("0")]
#[case::negative("-4")]
#[case::text("lots")]
fn disk_size_must_be_positive(#[case] value: &str) {
    let result = Cli::try_parse_from(["vastbench", "--disk-size", value]);

    assert!(result.is_err(), "disk size {value} should be rejected");
}

#[rstest]
fn zero_gpus_are_rejected() {
    assert!(Cli::try_parse_from(["vastbench", "--num-gpus", "0"]).is_err());
}

#[rstest]
fn results_banner_wraps_text() {
    let mut buffer = Vec::new();
    print_results(&mut buffer, "OK 42 tok/s\n").expect("write to buffer");

    let rendered = String::from_utf8(buffer).expect("utf8 output");
    assert_eq!(
        rendered,
        format!("\n{BANNER_RULE}\nBENCHMARK RESULTS\n{BANNER_RULE}\nOK 42 tok/s\n{BANNER_RULE}\n")
    );
}

#[rstest]
fn config_drives_transport_settings(config: VastbenchConfig) {
    assert_eq!(config.transport_settings(), TransportSettings::default());
}

#[rstest]
fn errors_are_written_on_one_line() {
    let mut buffer = Vec::new();
    write_error(
        &mut buffer,
        &CliError::Config(ConfigError::Invalid(String::from("image must not be empty"))),
    );

    assert_eq!(
        String::from_utf8(buffer).expect("utf8 output"),
        "configuration error: invalid configuration: image must not be empty\n"
    );
}
