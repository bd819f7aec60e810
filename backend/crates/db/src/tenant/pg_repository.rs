use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::tenant::models::{CrmAccount, LastPulledDates, Tenant};
use crate::tenant::repositories::TenantRepository;
use hubsync_common::error::{HubsyncError, HubsyncResult};

#[derive(Clone)]
pub struct PgTenantRepository {
    pool: PgPool,
}

impl PgTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_account(row: sqlx::postgres::PgRow) -> CrmAccount {
        CrmAccount {
            id: row.get("id"),
            hub_id: row.get("hub_id"),
            access_token: row.get("access_token"),
            refresh_token: row.get("refresh_token"),
            last_pulled: LastPulledDates {
                contacts: row.get("contacts_pulled_at"),
                companies: row.get("companies_pulled_at"),
                meetings: row.get("meetings_pulled_at"),
            },
        }
    }
}

#[async_trait]
impl TenantRepository for PgTenantRepository {
    async fn find_one(&self) -> HubsyncResult<Tenant> {
        let row = sqlx::query("select id, name from tenants order by created_at asc limit 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| HubsyncError::Database(e.to_string()))?
            .ok_or_else(|| HubsyncError::NotFound("no tenant configured".to_owned()))?;

        let tenant_id: Uuid = row.get("id");
        let name: String = row.get("name");

        let accounts = sqlx::query(
            "select id, hub_id, access_token, refresh_token,
                    contacts_pulled_at, companies_pulled_at, meetings_pulled_at
             from crm_accounts
             where tenant_id = $1
             order by hub_id asc",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HubsyncError::Database(e.to_string()))?
        .into_iter()
        .map(Self::map_account)
        .collect();

        Ok(Tenant {
            id: tenant_id,
            name,
            accounts,
        })
    }

    async fn save_account(&self, tenant_id: Uuid, account: &CrmAccount) -> HubsyncResult<()> {
        let result = sqlx::query(
            "update crm_accounts
             set access_token = $1,
                 refresh_token = $2,
                 contacts_pulled_at = $3,
                 companies_pulled_at = $4,
                 meetings_pulled_at = $5,
                 updated_at = $6
             where tenant_id = $7 and hub_id = $8",
        )
        .bind(&account.access_token)
        .bind(&account.refresh_token)
        .bind(account.last_pulled.contacts)
        .bind(account.last_pulled.companies)
        .bind(account.last_pulled.meetings)
        .bind(Utc::now())
        .bind(tenant_id)
        .bind(&account.hub_id)
        .execute(&self.pool)
        .await
        .map_err(|e| HubsyncError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(HubsyncError::NotFound(format!(
                "crm account {} for tenant {tenant_id}",
                account.hub_id
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_pool;
    use chrono::TimeZone;
    use std::sync::{Mutex, MutexGuard};

    // Tests share the tenants table and find_one reads the oldest row.
    static DB_LOCK: Mutex<()> = Mutex::new(());

    fn db_lock() -> MutexGuard<'static, ()> {
        DB_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn test_repo() -> Option<(PgTenantRepository, PgPool)> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = create_pool(&url).await.expect("db should connect");

        sqlx::raw_sql(include_str!("../../../../migrations/0001_tenants.sql"))
            .execute(&pool)
            .await
            .ok()?;

        Some((PgTenantRepository::new(pool.clone()), pool))
    }

    async fn insert_tenant(pool: &PgPool) -> Uuid {
        sqlx::query("delete from crm_accounts")
            .execute(pool)
            .await
            .expect("clear accounts");
        sqlx::query("delete from tenants")
            .execute(pool)
            .await
            .expect("clear tenants");

        let id = Uuid::new_v4();
        sqlx::query("insert into tenants (id, name) values ($1, $2)")
            .bind(id)
            .bind("acme")
            .execute(pool)
            .await
            .expect("insert tenant");
        id
    }

    async fn insert_account(pool: &PgPool, tenant_id: Uuid, hub_id: &str) {
        sqlx::query(
            "insert into crm_accounts (id, tenant_id, hub_id, access_token, refresh_token)
             values ($1, $2, $3, 'old-access', 'refresh')",
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(hub_id)
        .execute(pool)
        .await
        .expect("insert account");
    }

    #[tokio::test]
    async fn find_one_loads_accounts() {
        let _guard = db_lock();
        let (repo, pool) = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let tenant_id = insert_tenant(&pool).await;
        insert_account(&pool, tenant_id, "222").await;
        insert_account(&pool, tenant_id, "111").await;

        let tenant = repo.find_one().await.expect("tenant should load");
        assert_eq!(tenant.id, tenant_id);
        assert_eq!(tenant.accounts.len(), 2);
        assert_eq!(tenant.accounts[0].hub_id, "111");
        assert!(tenant.accounts[0].last_pulled.contacts.is_none());
    }

    #[tokio::test]
    async fn save_account_persists_tokens_and_watermarks() {
        let _guard = db_lock();
        let (repo, pool) = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let tenant_id = insert_tenant(&pool).await;
        insert_account(&pool, tenant_id, "333").await;

        let mut account = repo.find_one().await.expect("load").accounts.remove(0);
        let at = Utc.with_ymd_and_hms(2026, 4, 2, 8, 30, 0).unwrap();
        account.access_token = "new-access".to_owned();
        account.last_pulled.meetings = Some(at);

        repo.save_account(tenant_id, &account)
            .await
            .expect("save should work");

        let reloaded = repo.find_one().await.expect("reload").accounts.remove(0);
        assert_eq!(reloaded.access_token, "new-access");
        assert_eq!(reloaded.last_pulled.meetings, Some(at));
        assert!(reloaded.last_pulled.companies.is_none());
    }

    #[tokio::test]
    async fn save_unknown_account_is_not_found() {
        let _guard = db_lock();
        let (repo, pool) = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let tenant_id = insert_tenant(&pool).await;

        let account = CrmAccount {
            id: Uuid::new_v4(),
            hub_id: "missing".to_owned(),
            access_token: String::new(),
            refresh_token: String::new(),
            last_pulled: LastPulledDates::default(),
        };

        let err = repo.save_account(tenant_id, &account).await.unwrap_err();
        assert!(matches!(err, HubsyncError::NotFound(_)));
    }
}
