/// Mock collaborators for the cloud seams, useful for testing purposes.
use crate::catalog::{self, ImageCatalog, ImagePage, ImageQuery};
use crate::iam::{self, RoleClient};
use crate::parameters::{self, ParameterStore};

use async_trait::async_trait;
use mockall::mock;

mock! {
    /// A Mock ImageCatalog for use in tests.
    pub ImageCatalog {}
    #[async_trait]
    impl ImageCatalog for ImageCatalog {
        async fn describe_images(
            &self,
            query: &ImageQuery,
            next_token: Option<String>,
        ) -> catalog::Result<ImagePage>;
    }
}

mock! {
    /// A Mock ParameterStore for use in tests.
    pub ParameterStore {}
    #[async_trait]
    impl ParameterStore for ParameterStore {
        async fn get_parameter(&self, name: &str) -> parameters::Result<String>;
    }
}

mock! {
    /// A Mock RoleClient for use in tests.
    pub RoleClient {}
    #[async_trait]
    impl RoleClient for RoleClient {
        async fn create_role(&self, role_name: &str, assume_role_policy: &str) -> iam::Result<String>;
        async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> iam::Result<()>;
        async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> iam::Result<()>;
        async fn delete_role(&self, role_name: &str) -> iam::Result<()>;
    }
}
