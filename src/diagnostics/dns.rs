use super::process::Invocation;

const SELF_IP_RESOLVER: &str = "@resolver1.opendns.com";
const SELF_IP_NAME: &str = "myip.opendns.com";
const TXT_RESOLVER: &str = "@ns1.google.com";
const TXT_NAME: &str = "o-o.myaddr.l.google.com";

/// Asks OpenDNS for the address our queries come from.
pub fn self_ip_lookup(dig_bin: &str) -> Invocation {
    Invocation::new("Public IP Lookup", dig_bin, [SELF_IP_NAME, SELF_IP_RESOLVER, "+short"])
}

/// TXT record whose answer is the resolver-facing address of this host.
pub fn txt_lookup(dig_bin: &str) -> Invocation {
    Invocation::new("Dig", dig_bin, ["-t", "txt", TXT_NAME, TXT_RESOLVER]).merging_stderr()
}

/// First non-empty line of a `+short` answer.
pub fn parse_short_answer(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with(';'))
        .map(|l| l.trim_matches('"').to_string())
}
