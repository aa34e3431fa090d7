use crate::diagnostics::process::Invocation;

/// `gcloud compute ssh` running `command` on the named instance.
pub fn remote_command(
    gcloud_bin: &str,
    instance: &str,
    project: &str,
    zone: &str,
    command: &str,
) -> Invocation {
    Invocation::new(
        "Reverse Traceroute",
        gcloud_bin,
        [
            "compute",
            "ssh",
            instance,
            "--project",
            project,
            "--zone",
            zone,
            "--command",
            command,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_command_args() {
        let inv = remote_command(
            "gcloud",
            "worker-1",
            "demo",
            "us-central1-a",
            "traceroute 203.0.113.9",
        );
        assert_eq!(inv.program, "gcloud");
        assert_eq!(
            inv.args,
            vec![
                "compute",
                "ssh",
                "worker-1",
                "--project",
                "demo",
                "--zone",
                "us-central1-a",
                "--command",
                "traceroute 203.0.113.9",
            ]
        );
    }
}
