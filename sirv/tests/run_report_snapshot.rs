use sirv::io::report::write_run_report;
use sirv::{run, RunConfig};

#[test]
fn run_report_snapshot_small() {
    let cfg = RunConfig {
        horizon: 1.0,
        step: 0.25,
        threshold_fraction: 0.01,
        ..RunConfig::default()
    };
    let outcome = run(&cfg).expect("run failed");

    let mut buf = Vec::new();
    write_run_report(&mut buf, &outcome.summary, &outcome.trajectory, 1).expect("write report");

    let s = String::from_utf8(buf).expect("utf8 report");
    insta::assert_snapshot!(s);
}
