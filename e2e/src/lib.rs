/*!
  Building blocks for the hybrid node end-to-end tests: the supported operating systems, image
  lookup, boot script rendering and the cloud resources a test run manages.
!*/

pub mod arch;
pub mod catalog;
pub mod iam;
pub mod os;
pub mod parameters;
pub mod provision;
pub mod signing_helper;
pub mod userdata;

#[cfg(any(feature = "mockall", test))]
pub mod mock;

/// Loads the shared AWS configuration for `region`.
pub async fn aws_config(region: &str) -> aws_config::SdkConfig {
    aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()))
        .load()
        .await
}
