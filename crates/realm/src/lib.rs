//! Realm 隔离加载核心
//!
//! 归档发现、Realm 组装、回退解析、跨 Realm 契约分发与扩展模块依赖解析

pub mod archive;
pub mod builder;
pub mod deps;
pub mod dispatch;
pub mod error;
pub mod fallback;
pub mod manifest;
pub mod realm;

pub use archive::{
    ArchiveLocation, ArchiveScanner, ArchiveWalk, EXTENSION_ARCHIVE_EXTENSIONS,
    MODULE_ARCHIVE_EXTENSIONS,
};
pub use builder::RealmBuilder;
pub use deps::{
    Dependency, InstallationReport, Installed, ManifestDependencyResolver, ManifestDescriptor,
    SearchScope,
};
pub use dispatch::{
    ContractBinding, DispatchError, Dispatcher, Linker, MethodSignature, NotFoundReason,
    TargetNotFound,
};
pub use error::{
    BindError, DiscoveryError, ManifestError, ResolutionError, ResolveError, ResolveFailure,
};
pub use fallback::{FallbackPolicy, FallbackRealm};
pub use manifest::Manifest;
pub use realm::{
    BOOTSTRAP_PREFIX, Definition, Origin, PlatformRealm, Realm, RealmSnapshot, Resolver,
};
