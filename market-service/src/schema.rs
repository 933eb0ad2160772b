diesel::table! {
    users (identifier) {
        identifier -> Varchar,
        secret_hash -> Varchar,
        role -> Varchar,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    farmer_profiles (identifier) {
        identifier -> Varchar,
        display_name -> Nullable<Varchar>,
        location -> Nullable<Varchar>,
        contact -> Nullable<Varchar>,
        product_summary -> Nullable<Varchar>,
        updated_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    products (id) {
        id -> Uuid,
        name -> Varchar,
        quantity -> Numeric,
        unit_price -> Numeric,
        farmer_identifier -> Varchar,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    orders (id) {
        id -> Uuid,
        product_id -> Uuid,
        client_identifier -> Varchar,
        quantity -> Numeric,
        total_price -> Numeric,
        farmer_identifier -> Varchar,
        status -> Varchar,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::joinable!(orders -> products (product_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    farmer_profiles,
    products,
    orders,
);
