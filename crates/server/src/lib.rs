pub mod error;
pub mod file_logging;
pub mod middleware;
pub mod routes;
pub mod ws_util;

pub type DeploymentImpl = local_deployment::LocalDeployment;
