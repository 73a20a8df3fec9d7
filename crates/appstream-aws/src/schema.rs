//! Attribute schemas of the AppStream resources and the provider block

use appstream_plugin::{Attribute, AttributeType, ElementType, Schema};

fn string_set() -> AttributeType {
    AttributeType::Set(ElementType::String)
}

fn single_block(block: Schema) -> AttributeType {
    AttributeType::List(ElementType::Block(block))
}

fn block_set(block: Schema) -> AttributeType {
    AttributeType::Set(ElementType::Block(block))
}

pub fn provider_schema() -> Schema {
    Schema::new()
        .attribute("region", Attribute::optional_string())
        .attribute("profile", Attribute::optional_string())
        .attribute("poll_interval_secs", Attribute::optional_int())
        .attribute("state_timeout_secs", Attribute::optional_int())
        .attribute("tag_delay_secs", Attribute::optional_int())
}

pub fn fleet_schema() -> Schema {
    Schema::new()
        .attribute("arn", Attribute::computed(AttributeType::String))
        .attribute(
            "compute_capacity",
            Attribute::required(single_block(
                Schema::new().attribute(
                    "desired_instances",
                    Attribute::required(AttributeType::Int),
                ),
            ))
            .max_items(1),
        )
        .attribute("description", Attribute::optional_string())
        .attribute("disconnect_timeout", Attribute::optional_computed(AttributeType::Int))
        .attribute("display_name", Attribute::optional_string())
        .attribute(
            "domain_info",
            Attribute::optional(single_block(
                Schema::new()
                    .attribute("directory_name", Attribute::optional_string())
                    .attribute(
                        "organizational_unit_distinguished_name",
                        Attribute::optional_string(),
                    ),
            ))
            .max_items(1),
        )
        .attribute("enable_default_internet_access", Attribute::optional_bool())
        .attribute(
            "fleet_type",
            Attribute::optional_computed(AttributeType::String).force_new(),
        )
        .attribute("iam_role_arn", Attribute::optional_string())
        .attribute("idle_disconnect_timeout", Attribute::optional_computed(AttributeType::Int))
        .attribute("image_name", Attribute::optional_string())
        .attribute("instance_type", Attribute::required_string())
        .attribute("max_user_duration", Attribute::optional_computed(AttributeType::Int))
        .attribute("name", Attribute::required_string().force_new())
        .attribute("state", Attribute::optional_computed(AttributeType::String))
        .attribute("stream_view", Attribute::optional_string().with_default("APP"))
        .attribute("tags", Attribute::optional(AttributeType::Map))
        .attribute(
            "vpc_config",
            Attribute::optional(single_block(
                Schema::new()
                    .attribute("security_group_ids", Attribute::optional(string_set()))
                    .attribute("subnet_ids", Attribute::optional(string_set())),
            ))
            .max_items(1),
        )
}

pub fn stack_schema() -> Schema {
    Schema::new()
        .attribute(
            "access_endpoints",
            Attribute::optional(block_set(
                Schema::new()
                    .attribute("endpoint_type", Attribute::required_string())
                    .attribute("vpce_id", Attribute::optional_string()),
            )),
        )
        .attribute(
            "application_settings",
            Attribute::optional_computed(single_block(
                Schema::new()
                    .attribute("enabled", Attribute::required(AttributeType::Bool))
                    .attribute("settings_group", Attribute::optional_string()),
            ))
            .max_items(1),
        )
        .attribute("arn", Attribute::computed(AttributeType::String))
        .attribute("description", Attribute::optional_string())
        .attribute("display_name", Attribute::optional_string())
        .attribute("embed_host_domains", Attribute::optional(string_set()))
        .attribute("feedback_url", Attribute::optional_string())
        .attribute("name", Attribute::required_string().force_new())
        .attribute("redirect_url", Attribute::optional_string())
        .attribute(
            "storage_connectors",
            Attribute::optional(block_set(
                Schema::new()
                    .attribute("connector_type", Attribute::required_string())
                    .attribute(
                        "domains",
                        Attribute::optional(AttributeType::List(ElementType::String)),
                    )
                    .attribute("resource_identifier", Attribute::optional_string()),
            )),
        )
        .attribute("tags", Attribute::optional(AttributeType::Map))
        .attribute(
            "user_settings",
            Attribute::optional(block_set(
                Schema::new()
                    .attribute("action", Attribute::required_string())
                    .attribute("permission", Attribute::required_string()),
            )),
        )
}

pub fn stack_attachment_schema() -> Schema {
    Schema::new()
        .attribute("appstream_fleet_id", Attribute::required_string())
        .attribute("appstream_stack_id", Attribute::required_string())
}
