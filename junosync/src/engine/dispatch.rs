//! Operations on a kind selected at runtime.

use log::debug;

use super::{Engine, Outcome};
use crate::error::Result;
use crate::resource::kinds::{DhcpRelay, InterfacePhysical, NatSourceRuleSet, ProxyProfile};
use crate::resource::{AnyResource, Resource, ResourceKind};
use crate::session::{Session, SessionHandle};

impl Engine {
    /// [`create`](Self::create) for a model of any kind.
    pub async fn create_any<S: Session + 'static>(
        &self,
        session: &SessionHandle<S>,
        model: &AnyResource,
    ) -> Result<Outcome<AnyResource>> {
        Ok(match model {
            AnyResource::ServicesProxyProfile(m) => self.create(session, m).await?.map(Into::into),
            AnyResource::InterfacePhysical(m) => self.create(session, m).await?.map(Into::into),
            AnyResource::ForwardingOptionsDhcpRelay(m) => {
                self.create(session, m).await?.map(Into::into)
            }
            AnyResource::SecurityNatSource(m) => self.create(session, m).await?.map(Into::into),
        })
    }

    /// [`update`](Self::update) for a model of any kind.
    pub async fn update_any<S: Session + 'static>(
        &self,
        session: &SessionHandle<S>,
        model: &AnyResource,
    ) -> Result<Outcome<AnyResource>> {
        Ok(match model {
            AnyResource::ServicesProxyProfile(m) => self.update(session, m).await?.map(Into::into),
            AnyResource::InterfacePhysical(m) => self.update(session, m).await?.map(Into::into),
            AnyResource::ForwardingOptionsDhcpRelay(m) => {
                self.update(session, m).await?.map(Into::into)
            }
            AnyResource::SecurityNatSource(m) => self.update(session, m).await?.map(Into::into),
        })
    }

    /// Read a stanza of `kind` by identifier. Returns `None` when absent.
    pub async fn read_any<S: Session>(
        &self,
        session: &SessionHandle<S>,
        kind: ResourceKind,
        id: &str,
    ) -> Result<Option<AnyResource>> {
        Ok(match kind {
            ResourceKind::ServicesProxyProfile => {
                self.read_id::<ProxyProfile, S>(session, id).await?.map(Into::into)
            }
            ResourceKind::InterfacePhysical => {
                self.read_id::<InterfacePhysical, S>(session, id).await?.map(Into::into)
            }
            ResourceKind::ForwardingOptionsDhcpRelay => {
                self.read_id::<DhcpRelay, S>(session, id).await?.map(Into::into)
            }
            ResourceKind::SecurityNatSource => {
                self.read_id::<NatSourceRuleSet, S>(session, id).await?.map(Into::into)
            }
        })
    }

    /// Delete a stanza of `kind` by identifier.
    pub async fn delete_any<S: Session + 'static>(
        &self,
        session: &SessionHandle<S>,
        kind: ResourceKind,
        id: &str,
    ) -> Result<Outcome<()>> {
        match kind {
            ResourceKind::ServicesProxyProfile => self.delete_id::<ProxyProfile, S>(session, id).await,
            ResourceKind::InterfacePhysical => {
                self.delete_id::<InterfacePhysical, S>(session, id).await
            }
            ResourceKind::ForwardingOptionsDhcpRelay => {
                self.delete_id::<DhcpRelay, S>(session, id).await
            }
            ResourceKind::SecurityNatSource => {
                self.delete_id::<NatSourceRuleSet, S>(session, id).await
            }
        }
    }

    /// Import by type name, e.g. `junos_security_nat_source`.
    pub async fn import_any<S: Session>(
        &self,
        session: &SessionHandle<S>,
        type_name: &str,
        id: &str,
    ) -> Result<AnyResource> {
        let kind: ResourceKind = type_name.parse()?;
        debug!("import {} '{}'", kind, id);
        Ok(match kind {
            ResourceKind::ServicesProxyProfile => {
                self.import::<ProxyProfile, S>(session, id).await?.into()
            }
            ResourceKind::InterfacePhysical => {
                self.import::<InterfacePhysical, S>(session, id).await?.into()
            }
            ResourceKind::ForwardingOptionsDhcpRelay => {
                self.import::<DhcpRelay, S>(session, id).await?.into()
            }
            ResourceKind::SecurityNatSource => {
                self.import::<NatSourceRuleSet, S>(session, id).await?.into()
            }
        })
    }

    async fn read_id<R: Resource, S: Session>(
        &self,
        session: &SessionHandle<S>,
        id: &str,
    ) -> Result<Option<R>> {
        let key = R::key_from_id(id)?;
        self.read::<R, S>(session, &key).await
    }

    async fn delete_id<R: Resource, S: Session + 'static>(
        &self,
        session: &SessionHandle<S>,
        id: &str,
    ) -> Result<Outcome<()>> {
        let key = R::key_from_id(id)?;
        self.delete::<R, S>(session, &key).await
    }
}
