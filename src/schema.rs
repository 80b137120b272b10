// Diesel table definitions for the link and settings collaborators.

diesel::table! {
    links (id) {
        id -> Integer,
        original_url -> Text,
        direct_video_url -> Nullable<Text>,
        video_expires_at -> Nullable<Text>,
        last_checked_at -> Nullable<Text>,
        is_active -> Integer,
        needs_review -> Integer,
        created_at -> Text,
    }
}

diesel::table! {
    settings (key) {
        key -> Text,
        value -> Text,
        updated_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(links, settings);
