//! Client service.

use common::{ClientId, Page, PageRequest, RequestContext, Sort};
use store::{
    Client, ClientField, ClientRepository, OrderRepository, Query, Store, Transaction, constraints,
};

use crate::counts::order_counts;
use crate::error::{DomainError, EntityKind, Result};
use crate::filter::ClientFilter;

/// Client attributes supplied on create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

impl ClientDraft {
    /// Checks that every field is filled in and the email looks like one.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("email", &self.email),
            ("phone", &self.phone),
        ] {
            if value.trim().is_empty() {
                return Err(DomainError::invalid(format!("{name} must not be blank")));
            }
        }
        if !self.email.contains('@') {
            return Err(DomainError::invalid("email must be a valid address"));
        }
        Ok(())
    }

    fn into_client(self, id: ClientId) -> Client {
        Client {
            id,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
        }
    }
}

/// A client together with the number of orders it has placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientView {
    pub id: ClientId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub orders_count: u64,
}

impl ClientView {
    fn new(client: Client, orders_count: u64) -> Self {
        Self {
            id: client.id,
            first_name: client.first_name,
            last_name: client.last_name,
            email: client.email,
            phone: client.phone,
            orders_count,
        }
    }
}

fn email_conflict(err: store::StoreError, email: &str) -> DomainError {
    if err.is_unique_violation_of(constraints::CLIENT_EMAIL_UNIQUE) {
        return DomainError::duplicate_identity("email", email);
    }
    DomainError::Store(err)
}

/// Service for managing clients.
pub struct ClientService<S: Store> {
    store: S,
}

impl<S: Store> ClientService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn create(&self, ctx: &RequestContext, draft: ClientDraft) -> Result<ClientView> {
        draft.validate()?;
        let client = draft.into_client(ClientId::new());

        let mut tx = self.store.begin().await?;
        if tx.client_email_exists(&client.email, None).await? {
            return Err(DomainError::duplicate_identity("email", client.email));
        }
        tx.insert_client(&client)
            .await
            .map_err(|e| email_conflict(e, &client.email))?;
        tx.commit().await?;

        tracing::info!(client_id = %client.id, "client created");
        Ok(ClientView::new(client, 0))
    }

    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn get_one(&self, ctx: &RequestContext, id: ClientId) -> Result<ClientView> {
        let mut tx = self.store.begin().await?;
        let client = tx
            .find_client(id)
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::Client, id))?;
        let counts = order_counts(&mut tx, &[id]).await?;
        tx.commit().await?;

        let count = counts.get(&id).copied().unwrap_or_default();
        Ok(ClientView::new(client, count))
    }

    /// Replaces every attribute of a client.
    ///
    /// Email uniqueness is only checked when the email actually changes,
    /// ignoring case.
    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: ClientId,
        draft: ClientDraft,
    ) -> Result<ClientView> {
        draft.validate()?;
        let client = draft.into_client(id);

        let mut tx = self.store.begin().await?;
        let existing = tx
            .find_client(id)
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::Client, id))?;

        if !existing.email.eq_ignore_ascii_case(&client.email)
            && tx.client_email_exists(&client.email, Some(id)).await?
        {
            return Err(DomainError::duplicate_identity("email", client.email));
        }
        tx.update_client(&client)
            .await
            .map_err(|e| email_conflict(e, &client.email))?;
        let counts = order_counts(&mut tx, &[id]).await?;
        tx.commit().await?;

        tracing::info!(client_id = %id, "client updated");
        let count = counts.get(&id).copied().unwrap_or_default();
        Ok(ClientView::new(client, count))
    }

    /// Deletes a client that has no orders.
    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn delete(&self, ctx: &RequestContext, id: ClientId) -> Result<()> {
        let mut tx = self.store.begin().await?;
        if tx.find_client(id).await?.is_none() {
            return Err(DomainError::not_found(EntityKind::Client, id));
        }
        if tx.order_exists_for_client(id).await? {
            return Err(DomainError::in_use(EntityKind::Client, id));
        }
        tx.delete_client(id).await.map_err(|e| {
            if e.is_foreign_key_violation_of(constraints::ORDER_CLIENT_FK) {
                DomainError::in_use(EntityKind::Client, id)
            } else {
                DomainError::Store(e)
            }
        })?;
        tx.commit().await?;

        tracing::info!(client_id = %id, "client deleted");
        Ok(())
    }

    /// Lists clients, by first name unless `page` says otherwise.
    ///
    /// Order counts for the whole page come from one grouped query.
    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn find_all(
        &self,
        ctx: &RequestContext,
        filter: ClientFilter,
        mut page: PageRequest<ClientField>,
    ) -> Result<Page<ClientView>> {
        if page.sort.is_empty() {
            page = page.sorted_by(Sort::asc(ClientField::FirstName));
        }
        let query = Query::new(filter.predicate(), page);

        let mut tx = self.store.begin().await?;
        let clients = tx.search_clients(&query).await?;
        let ids: Vec<ClientId> = clients.content.iter().map(|c| c.id).collect();
        let counts = order_counts(&mut tx, &ids).await?;
        tx.commit().await?;

        Ok(clients.map(|c| {
            let count = counts.get(&c.id).copied().unwrap_or_default();
            ClientView::new(c, count)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(email: &str) -> ClientDraft {
        ClientDraft {
            first_name: "Ann".to_string(),
            last_name: "Lee".to_string(),
            email: email.to_string(),
            phone: "555".to_string(),
        }
    }

    #[test]
    fn validate_rejects_blank_fields_and_bad_email() {
        assert!(draft("ann@example.com").validate().is_ok());
        assert!(matches!(
            draft("not-an-email").validate(),
            Err(DomainError::InvalidArgument(_))
        ));
        let mut blank = draft("ann@example.com");
        blank.last_name = "  ".to_string();
        assert!(blank.validate().is_err());
    }
}
