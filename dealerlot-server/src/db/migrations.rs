//! Database migrations for inventory tables

use sqlx::PgPool;

/// Run all inventory migrations. Every statement is idempotent.
pub async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running inventory migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vehicles (
            id BIGSERIAL PRIMARY KEY,
            vin TEXT NOT NULL,
            year INTEGER NOT NULL,
            make TEXT NOT NULL,
            model TEXT NOT NULL,
            trim TEXT,
            mileage INTEGER,
            price DOUBLE PRECISION,
            color TEXT,
            description TEXT,
            status TEXT NOT NULL DEFAULT 'Available'
                CHECK (status IN ('Available', 'Pending', 'Sold', 'Reserved')),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    create_indexes(pool).await?;

    tracing::info!("Inventory migrations complete");
    Ok(())
}

async fn create_indexes(pool: &PgPool) -> Result<(), sqlx::Error> {
    // VINs are stored upper-cased; uniqueness is enforced on that form
    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_vehicles_vin ON vehicles(UPPER(vin))")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vehicles_status ON vehicles(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vehicles_make ON vehicles(LOWER(make))")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_vehicles_created ON vehicles(created_at DESC, id DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
