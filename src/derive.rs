//! The derivation engine
//!
//! Turns the loosely-typed source tree plus an opaque token string into a
//! fully-formed [`InitConfiguration`]. The derivation is decomposed into
//! independently testable steps, each owning one sub-region of the target
//! record, run in a fixed order:
//!
//! 1. endpoints/identity
//! 2. networking (with DNS-1123 validation)
//! 3. image repositories
//! 4. container runtime and per-component extra args
//! 5. cloud-provider fan-out
//! 6. CNI paths
//! 7. version selection
//! 8. external etcd
//! 9. bootstrap token
//!
//! The ordering matters in two places: the cloud-provider fan-out must run
//! after the per-component extra-args copy so it augments rather than gets
//! clobbered, and the external-etcd step replaces any local-etcd variant
//! chosen by the images step.
//!
//! Every read is get-if-present: an absent source path leaves the target
//! field at whatever the base record held. The first validation failure
//! aborts the whole derivation; no partial record is returned.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::{Etcd, ExternalEtcd, InitConfiguration, LocalEtcd};
use crate::dns::is_dns1123_subdomain;
use crate::source::ConfigSource;
use crate::token::BootstrapToken;
use crate::{Error, Result, DEFAULT_API_SERVER_PORT, DEFAULT_RESOLV_UPSTREAM_CONF};

/// Known container runtime engines and their control socket paths
///
/// Process-wide constant table; an engine name outside this table is a hard
/// derivation failure.
pub const CRI_SOCKETS: &[(&str, &str)] = &[
    ("docker", "/var/run/dockershim.sock"),
    ("containerd", "/run/containerd/containerd.sock"),
    ("crio", "/var/run/crio/crio.sock"),
];

/// Look up the control socket path for a known runtime engine
pub fn cri_socket(engine: &str) -> Option<&'static str> {
    CRI_SOCKETS
        .iter()
        .find(|(name, _)| *name == engine)
        .map(|(_, socket)| *socket)
}

/// Derive an init configuration from a source tree and a token string
///
/// Starts from a zero-valued base record. See [`derive_init_config_into`]
/// for deriving on top of a pre-populated base.
pub fn derive_init_config(source: &dyn ConfigSource, token: &str) -> Result<InitConfiguration> {
    derive_init_config_into(InitConfiguration::default(), source, token)
}

/// Derive an init configuration on top of a caller-supplied base record
///
/// The derivation only ever adds or overwrites fields that are explicitly
/// present in the source tree; everything else keeps the base value. On the
/// first error the base is discarded and no partial record is returned.
pub fn derive_init_config_into(
    mut config: InitConfiguration,
    source: &dyn ConfigSource,
    token: &str,
) -> Result<InitConfiguration> {
    debug!("creating initialization configuration");

    derive_endpoints(source, &mut config)?;
    derive_networking(source, &mut config)?;
    derive_images(source, &mut config);
    derive_runtime(source, &mut config)?;
    derive_cloud_provider(source, &mut config);
    derive_cni(source, &mut config);
    derive_version(source, &mut config);
    derive_etcd(source, &mut config);
    derive_bootstrap_token(token, &mut config)?;

    Ok(config)
}

// =============================================================================
// Merge policies
// =============================================================================
// Extra-args maps are touched under two different, deliberate policies. The
// per-component copy replaces the whole map; the fan-out merges into it.

/// Replace a target extra-args map wholesale with user-supplied arguments
///
/// Policy: `replace`. A user-supplied per-component args block takes full
/// ownership of that component's map, including dropping anything a previous
/// step synthesized into it.
fn replace_args(target: &mut BTreeMap<String, String>, args: BTreeMap<String, String>) {
    *target = args;
}

/// Merge a single derived argument into a target extra-args map
///
/// Policy: `union`. Existing unrelated keys are kept; the given key is
/// inserted or overwritten.
fn merge_arg(target: &mut BTreeMap<String, String>, key: &str, value: &str) {
    target.insert(key.to_string(), value.to_string());
}

// =============================================================================
// Derivation steps
// =============================================================================

/// Endpoint and identity derivation (`api.0.*`)
fn derive_endpoints(source: &dyn ConfigSource, config: &mut InitConfiguration) -> Result<()> {
    if let Some(external) = source.get_str("api.0.external") {
        config.cluster.control_plane_endpoint =
            address_with_port(&external, DEFAULT_API_SERVER_PORT);
    }

    if let Some(internal) = source.get_str("api.0.internal") {
        let (host, port) = split_host_port(&internal)?;

        config.local_api_endpoint.advertise_address = host.clone();
        if !port.is_empty() {
            config.local_api_endpoint.bind_port = port
                .parse()
                .map_err(|_| Error::malformed_endpoint(internal.clone()))?;
        }

        // The bind address must always be a valid certificate name
        config.cluster.api_server.cert_sans.push(host);
    }

    if let Some(alt_names) = source.get_str_list("api.0.alt_names") {
        // No dedup: duplicates are tolerated downstream
        config.cluster.api_server.cert_sans.extend(alt_names);
    }

    Ok(())
}

/// Networking derivation (`network.0.*`)
fn derive_networking(source: &dyn ConfigSource, config: &mut InitConfiguration) -> Result<()> {
    if let Some(pods) = source.get_str("network.0.pods") {
        // No CIDR-syntax validation at this layer; kubeadm checks it
        config.cluster.networking.pod_subnet = pods;
    }
    if let Some(services) = source.get_str("network.0.services") {
        config.cluster.networking.service_subnet = services;
    }

    if let Some(domain) = source.get_str("network.0.dns.0.domain") {
        // Validate here, otherwise `kubeadm init` fails much later with an
        // opaque message
        if !is_dns1123_subdomain(&domain) {
            return Err(Error::invalid_dns_domain(domain));
        }
        config.cluster.networking.dns_domain = domain;
    }

    if let Some(upstream) = source.get_str_list("network.0.dns.0.upstream") {
        // Presence-triggered: having any upstream servers switches the
        // kubelet to the systemd-resolved upstream file; the list contents
        // themselves are consumed by the DNS deployment, not here
        if !upstream.is_empty() {
            merge_arg(
                &mut config.node_registration.kubelet_extra_args,
                "resolv-conf",
                DEFAULT_RESOLV_UPSTREAM_CONF,
            );
        }
    }

    Ok(())
}

/// Image repository derivation (`images.0.*`)
fn derive_images(source: &dyn ConfigSource, config: &mut InitConfiguration) {
    if let Some(repo) = source.get_str("images.0.kube_repo") {
        config.cluster.image_repository = repo;
    }

    let etcd_repo = source.get_str("images.0.etcd_repo").unwrap_or_default();
    let etcd_version = source.get_str("images.0.etcd_version").unwrap_or_default();
    // Only emit a local-etcd override when there is something to override
    if !etcd_repo.is_empty() || !etcd_version.is_empty() {
        config.cluster.etcd = Some(Etcd::Local(LocalEtcd {
            image_repository: etcd_repo,
            image_tag: etcd_version,
        }));
    }
}

/// Container runtime derivation (`runtime.0.*`)
fn derive_runtime(source: &dyn ConfigSource, config: &mut InitConfiguration) -> Result<()> {
    if let Some(engine) = source.get_str("runtime.0.engine") {
        let socket =
            cri_socket(&engine).ok_or_else(|| Error::unsupported_runtime(engine.clone()))?;
        debug!(socket, "setting CRI socket");
        merge_arg(
            &mut config.node_registration.kubelet_extra_args,
            "container-runtime-endpoint",
            &format!("unix://{socket}"),
        );
        config.node_registration.cri_socket = socket.to_string();
    }

    // Per-component extra args replace the target maps wholesale: the user
    // block owns the whole map. This is deliberately asymmetric with the
    // cloud-provider fan-out below, which merges.
    if let Some(args) = source.get_str_map("runtime.0.extra_args.0.api_server") {
        replace_args(&mut config.cluster.api_server.extra_args, args);
    }
    if let Some(args) = source.get_str_map("runtime.0.extra_args.0.controller_manager") {
        replace_args(&mut config.cluster.controller_manager.extra_args, args);
    }
    if let Some(args) = source.get_str_map("runtime.0.extra_args.0.scheduler") {
        replace_args(&mut config.cluster.scheduler.extra_args, args);
    }
    if let Some(args) = source.get_str_map("runtime.0.extra_args.0.kubelet") {
        replace_args(&mut config.node_registration.kubelet_extra_args, args);
    }

    Ok(())
}

/// Cloud-provider fan-out (`cloud.0.provider`)
///
/// Any non-empty provider name selects the external cloud provider: the
/// provisioning layer loads the provider's own manager, so the kubelet, API
/// server, and controller manager all defer to it. Must run after
/// [`derive_runtime`] so the fan-out augments user-supplied args instead of
/// being clobbered by the wholesale replace.
fn derive_cloud_provider(source: &dyn ConfigSource, config: &mut InitConfiguration) {
    let provider = match source.get_str("cloud.0.provider") {
        Some(p) if !p.is_empty() => p,
        _ => return,
    };
    debug!(%provider, "using external cloud provider");

    merge_arg(
        &mut config.node_registration.kubelet_extra_args,
        "cloud-provider",
        "external",
    );
    merge_arg(
        &mut config.cluster.api_server.extra_args,
        "cloud-provider",
        "external",
    );
    merge_arg(
        &mut config.cluster.controller_manager.extra_args,
        "cloud-provider",
        "external",
    );
}

/// CNI path derivation (`cni.0.*`)
fn derive_cni(source: &dyn ConfigSource, config: &mut InitConfiguration) {
    if let Some(bin_dir) = source.get_str("cni.0.bin_dir") {
        merge_arg(
            &mut config.node_registration.kubelet_extra_args,
            "cni-bin-dir",
            &bin_dir,
        );
    }
    if let Some(conf_dir) = source.get_str("cni.0.conf_dir") {
        merge_arg(
            &mut config.node_registration.kubelet_extra_args,
            "cni-conf-dir",
            &conf_dir,
        );
    }
}

/// Version selection (`version`)
fn derive_version(source: &dyn ConfigSource, config: &mut InitConfiguration) {
    if let Some(version) = source.get_str("version") {
        if !version.is_empty() {
            config.cluster.kubernetes_version = version;
        }
    }
}

/// External etcd derivation (`etcd.0.endpoints`)
fn derive_etcd(source: &dyn ConfigSource, config: &mut InitConfiguration) {
    if let Some(endpoints) = source.get_str_list("etcd.0.endpoints") {
        // External endpoints select the external variant outright; a local
        // variant chosen by the images step is dropped, not merged
        config.cluster.etcd = Some(Etcd::External(ExternalEtcd { endpoints }));
    }
}

/// Bootstrap token derivation
fn derive_bootstrap_token(token: &str, config: &mut InitConfiguration) -> Result<()> {
    if token.is_empty() {
        return Ok(());
    }

    let mut record = BootstrapToken::parse(token)?;
    // Bootstrap tokens installed through this configuration never expire:
    // nodes may join long after the control plane came up
    record.expires = None;
    config.bootstrap_tokens = vec![record];

    Ok(())
}

// =============================================================================
// Endpoint helpers
// =============================================================================

/// Append the default port to an address unless it already carries one
fn address_with_port(address: &str, default_port: u16) -> String {
    let has_port = if let Some(rest) = address.strip_prefix('[') {
        // Bracketed IPv6: a port follows the closing bracket
        rest.split_once(']')
            .map(|(_, rest)| rest.starts_with(':'))
            .unwrap_or(false)
    } else {
        address.contains(':')
    };
    if has_port {
        address.to_string()
    } else {
        format!("{address}:{default_port}")
    }
}

/// Split an endpoint into host and port segments
///
/// The port segment may be empty (`"10.0.0.5:"`); a missing `:` separator is
/// a malformed endpoint, matching the upstream host:port grammar.
fn split_host_port(endpoint: &str) -> Result<(String, String)> {
    if let Some(rest) = endpoint.strip_prefix('[') {
        // Bracketed IPv6 literal
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| Error::malformed_endpoint(endpoint))?;
        let port = rest
            .strip_prefix(':')
            .ok_or_else(|| Error::malformed_endpoint(endpoint))?;
        return Ok((host.to_string(), port.to_string()));
    }

    let (host, port) = endpoint
        .rsplit_once(':')
        .ok_or_else(|| Error::malformed_endpoint(endpoint))?;
    if host.contains(':') {
        // Unbracketed IPv6 is ambiguous
        return Err(Error::malformed_endpoint(endpoint));
    }
    Ok((host.to_string(), port.to_string()))
}
