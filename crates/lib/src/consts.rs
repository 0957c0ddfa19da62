//! Names and defaults shared across the crate.

pub const APP_NAME: &str = "checkbuild";

/// Legacy config file looked up in the home directory.
pub const LEGACY_CONFIG_FILENAME: &str = ".checkbuild.toml";

pub const CONFIG_FILENAME: &str = "config.toml";

pub const DEFAULT_PRODUCTION_BRANCH: &str = "master";
pub const DEFAULT_DEV_SUFFIX: &str = "-experimental";
pub const DEFAULT_MANIFEST_FILE: &str = "manifest.toml";

/// Optional file in a check directory describing a local run.
pub const LOCAL_RUN_FILE: &str = "local.toml";
pub const DEFAULT_CONTAINER_CLI: &str = "docker";

/// Image labels recorded at build time and read back from the registry.
pub const LABEL_COMMIT: &str = "commit";
pub const LABEL_TOOLCHAIN_VERSION: &str = "sdk-version";
pub const LABEL_MANIFEST: &str = "manifest";

/// Prefix the registry puts in front of image labels when exposing them as properties.
pub const REGISTRY_LABEL_PREFIX: &str = "docker.label.";

pub const ENV_REGISTRY_USER: &str = "DOCKER_REGISTRY_USER";
pub const ENV_REGISTRY_PASSWORD: &str = "DOCKER_REGISTRY_PWD";
pub const ENV_REGISTRY: &str = "DOCKER_REGISTRY";

/// Value of the force variable that rebuilds every artifact.
pub const FORCE_ALL_TOKEN: &str = "ALL";

/// Branch being built, as set by the caller or the CI system.
pub const ENV_BRANCH: &str = "BUILD_BRANCH";
pub const ENV_CI_BRANCH: &str = "TRAVIS_BRANCH";

/// Force setting for detection: unset, [`FORCE_ALL_TOKEN`] or a check name.
pub const ENV_FORCE_BUILD: &str = "FORCE_BUILD";
