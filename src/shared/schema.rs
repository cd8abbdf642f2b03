diesel::table! {
    campaigns (id) {
        id -> Uuid,
        workspace_id -> Uuid,
        name -> Text,
        description -> Nullable<Text>,
        campaign_type -> Text,
        objective -> Nullable<Text>,
        status -> Text,
        start_date -> Nullable<Timestamptz>,
        end_date -> Nullable<Timestamptz>,
        total_targeted -> Int4,
        total_sent -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    campaign_templates (id) {
        id -> Uuid,
        workspace_id -> Uuid,
        campaign_id -> Uuid,
        channel -> Text,
        name -> Text,
        variables_schema -> Jsonb,
        subject_template -> Nullable<Text>,
        body_template -> Nullable<Text>,
        provider_metadata -> Jsonb,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    campaign_steps (id) {
        id -> Uuid,
        workspace_id -> Uuid,
        campaign_id -> Uuid,
        step_number -> Int4,
        template_id -> Nullable<Uuid>,
        wait_after_ms -> Int4,
        condition -> Jsonb,
        branch_label -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    campaign_targets (id) {
        id -> Uuid,
        workspace_id -> Uuid,
        campaign_id -> Uuid,
        opportunity_id -> Uuid,
        contact_id -> Nullable<Uuid>,
        account_id -> Nullable<Uuid>,
        state -> Text,
        next_step_number -> Int4,
        last_attempt_at -> Nullable<Timestamptz>,
        assigned_at -> Timestamptz,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    campaign_target_overrides (id) {
        id -> Uuid,
        workspace_id -> Uuid,
        campaign_id -> Uuid,
        target_id -> Uuid,
        step_id -> Uuid,
        overrides_json -> Jsonb,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    campaign_step_runs (id) {
        id -> Uuid,
        workspace_id -> Uuid,
        campaign_id -> Uuid,
        target_id -> Uuid,
        step_id -> Uuid,
        channel -> Text,
        resolved_payload -> Jsonb,
        provider_response -> Jsonb,
        status -> Text,
        provider_message_id -> Nullable<Text>,
        execution_id -> Nullable<Text>,
        error_json -> Jsonb,
        sent_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    campaigns,
    campaign_templates,
    campaign_steps,
    campaign_targets,
    campaign_target_overrides,
    campaign_step_runs,
);
