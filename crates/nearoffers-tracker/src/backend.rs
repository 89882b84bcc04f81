//! The backend queries the controller depends on.

use futures::future::{BoxFuture, FutureExt};
use nearoffers_client::{ClientError, OffersClient};
use nearoffers_core::{Business, Coordinate, Offer, SearchRadius};

pub trait OfferSource: Send + Sync {
    /// Offers within `radius` of `center`, nearest first as the server sends them.
    fn nearby_offers(
        &self,
        center: Coordinate,
        radius: SearchRadius,
    ) -> BoxFuture<'_, Result<Vec<Offer>, ClientError>>;

    fn businesses(&self) -> BoxFuture<'_, Result<Vec<Business>, ClientError>>;
}

impl OfferSource for OffersClient {
    fn nearby_offers(
        &self,
        center: Coordinate,
        radius: SearchRadius,
    ) -> BoxFuture<'_, Result<Vec<Offer>, ClientError>> {
        OffersClient::nearby_offers(self, center, radius).boxed()
    }

    fn businesses(&self) -> BoxFuture<'_, Result<Vec<Business>, ClientError>> {
        OffersClient::businesses(self).boxed()
    }
}
