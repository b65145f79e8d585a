//! Restructuring usable source data directly into card content
//!
//! No generative rewrite happens here. A card is only produced when its
//! sources are usable and the result meets the card's shape contract;
//! otherwise the caller moves on to a generated strategy.

use serde_json::{Value, json};

use super::parse::check_shape;
use crate::lookup;
use crate::models::source::{
    CurrencyData, FlightsData, HotelsData, TrainsData, TravelGuideData, VisaData,
};
use crate::models::{CardType, SourceKind, SourcePayload, TravelRequest, ValidatedSourceData};
use crate::providers::CurrencyLookup;

/// Read-only view over the usable typed payloads of one request
pub struct SourceView<'a> {
    sources: &'a ValidatedSourceData,
    rates: &'a dyn CurrencyLookup,
    max_items: usize,
}

impl<'a> SourceView<'a> {
    #[must_use]
    pub fn new(sources: &'a ValidatedSourceData, rates: &'a dyn CurrencyLookup, max_items: usize) -> Self {
        Self {
            sources,
            rates,
            max_items: max_items.max(1),
        }
    }

    fn payload(&self, kind: SourceKind) -> Option<&'a SourcePayload> {
        self.sources
            .get(kind)
            .filter(|s| s.usable)
            .and_then(|s| s.record.payload.as_ref())
    }

    fn guide(&self) -> Option<&'a TravelGuideData> {
        match self.payload(SourceKind::TravelGuide)? {
            SourcePayload::TravelGuide(d) => Some(d),
            _ => None,
        }
    }

    fn flights(&self) -> Option<&'a FlightsData> {
        match self.payload(SourceKind::Flights)? {
            SourcePayload::Flights(d) if !d.flights.is_empty() => Some(d),
            _ => None,
        }
    }

    fn hotels(&self) -> Option<&'a HotelsData> {
        match self.payload(SourceKind::Hotels)? {
            SourcePayload::Hotels(d) if !d.hotels.is_empty() => Some(d),
            _ => None,
        }
    }

    fn trains(&self) -> Option<&'a TrainsData> {
        match self.payload(SourceKind::Trains)? {
            SourcePayload::Trains(d) if !d.trains.is_empty() => Some(d),
            _ => None,
        }
    }

    fn visa(&self) -> Option<&'a VisaData> {
        match self.payload(SourceKind::Visa)? {
            SourcePayload::Visa(d) => Some(d),
            _ => None,
        }
    }

    fn currency(&self) -> Option<&'a CurrencyData> {
        match self.payload(SourceKind::Currency)? {
            SourcePayload::Currency(d) => Some(d),
            _ => None,
        }
    }

    /// Convert into `local`; amounts without a known currency are read as USD
    fn to_local(&self, amount: f64, currency: Option<&str>, local: &str) -> f64 {
        let from = currency
            .filter(|c| lookup::usd_rate(c).is_some())
            .unwrap_or(lookup::DEFAULT_CURRENCY);
        self.rates
            .convert(amount, from, local)
            .unwrap_or(amount)
            .round()
    }
}

/// Card content built from source data alone, if the sources allow it
#[must_use]
pub fn restructure(card_type: CardType, request: &TravelRequest, view: &SourceView<'_>) -> Option<Value> {
    let content = match card_type {
        CardType::Overview => overview(request, view),
        CardType::Itinerary => itinerary(request, view),
        CardType::Budget => budget(request, view),
        CardType::Transport => transport(request, view),
        CardType::Accommodation => accommodation(view),
        CardType::Attractions => attractions(view),
        CardType::Food => food(request, view),
        CardType::Visa => visa(view),
        CardType::Weather => weather(view),
        CardType::Tips => tips(request, view),
    }?;

    check_shape(card_type, &content).ok()?;
    Some(content)
}

fn attraction_names(guide: &TravelGuideData) -> Vec<String> {
    guide
        .attractions
        .iter()
        .filter_map(|a| a.name.clone())
        .collect()
}

fn overview(request: &TravelRequest, view: &SourceView<'_>) -> Option<Value> {
    let guide = view.guide()?;
    let summary = guide.overview.clone()?;
    let highlights: Vec<String> = attraction_names(guide).into_iter().take(view.max_items).collect();
    Some(json!({
        "summary": summary,
        "highlights": highlights,
        "bestTimeToVisit": guide.best_time_to_visit,
        "idealFor": [request.travelers.to_string(), request.style.clone()],
    }))
}

fn itinerary(request: &TravelRequest, view: &SourceView<'_>) -> Option<Value> {
    let guide = view.guide()?;
    let names = attraction_names(guide);
    if names.is_empty() {
        return None;
    }

    let days = request.typical_days().max(1);
    let destination = request.destination.trim();
    let plan: Vec<Value> = (0..days)
        .map(|i| {
            let activities: Vec<String> = names
                .iter()
                .skip(i as usize)
                .step_by(days as usize)
                .cloned()
                .collect();
            let activities = if activities.is_empty() {
                vec![format!("Free time to explore {destination}")]
            } else {
                activities
            };
            json!({
                "day": i + 1,
                "title": activities.first().cloned().unwrap_or_default(),
                "activities": activities,
            })
        })
        .collect();

    Some(json!({
        "days": plan,
        "totalDays": days,
        "pace": request.style,
    }))
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

fn budget(request: &TravelRequest, view: &SourceView<'_>) -> Option<Value> {
    let local = lookup::local_currency(&request.destination);
    let days = request.typical_days().max(1);
    let nights = days.saturating_sub(1).max(1);
    let travelers = request.travelers.headcount().max(1);
    let rooms = travelers.div_ceil(2);

    let stay = view.hotels().and_then(|h| {
        mean(h.hotels.iter().filter_map(|o| {
            o.price_per_night
                .filter(|p| *p > 0.0)
                .map(|p| view.to_local(p, o.currency.as_deref(), local))
        }))
    });
    let fare = view.flights().and_then(|f| {
        mean(f.flights.iter().filter_map(|o| {
            o.price
                .filter(|p| *p > 0.0)
                .map(|p| view.to_local(p, o.currency.as_deref(), local))
        }))
    });
    if stay.is_none() && fare.is_none() {
        return None;
    }

    let accommodation = stay.map_or(0.0, |s| (s * f64::from(nights) * f64::from(rooms)).round());
    // Return trip for everyone
    let transport = fare.map_or(0.0, |f| (f * 2.0 * f64::from(travelers)).round());
    let daily_extras = view.to_local(request.budget.daily_spend_usd() * 0.5, None, local);
    let food = (daily_extras * 0.6 * f64::from(days * travelers)).round();
    let activities = (daily_extras * 0.4 * f64::from(days * travelers)).round();
    let total = accommodation + transport + food + activities;

    let mut saving_tips = vec!["Compare a few dates before booking flights".to_string()];
    if let Some(rate) = view.currency().and_then(|c| c.rate) {
        saving_tips.push(format!(
            "Exchange rate reported at {rate:.2}; avoid airport exchange counters"
        ));
    }

    Some(json!({
        "budget": {
            "level": request.budget.as_str(),
            "total": total,
            "perPerson": (total / f64::from(travelers)).round(),
            "perDay": (total / f64::from(days)).round(),
        },
        "currency": local,
        "breakdown": {
            "accommodation": accommodation,
            "transport": transport,
            "food": food,
            "activities": activities,
        },
        "dailyAverage": (total / f64::from(days)).round(),
        "savingTips": saving_tips,
    }))
}

fn transport(request: &TravelRequest, view: &SourceView<'_>) -> Option<Value> {
    let mut options = Vec::new();
    if let Some(flights) = view.flights() {
        options.extend(flights.flights.iter().take(view.max_items).map(|f| {
            json!({
                "mode": "flight",
                "carrier": f.airline,
                "price": f.price,
                "currency": f.currency,
                "departure": f.departure,
                "arrival": f.arrival,
                "duration": f.duration,
                "stops": f.stops,
            })
        }));
    }
    if let Some(trains) = view.trains() {
        options.extend(trains.trains.iter().take(view.max_items).map(|t| {
            json!({
                "mode": "train",
                "carrier": t.name,
                "number": t.number,
                "price": t.price,
                "currency": t.currency,
                "departure": t.departure,
                "arrival": t.arrival,
                "duration": t.duration,
                "class": t.class,
            })
        }));
    }
    if options.is_empty() {
        return None;
    }

    Some(json!({
        "options": options,
        "gettingAround": [format!("Local taxis and ride-hailing in {}", request.destination.trim())],
        "tips": ["Book popular routes at least two weeks ahead"],
    }))
}

fn accommodation(view: &SourceView<'_>) -> Option<Value> {
    let hotels = view.hotels()?;
    let mut offers: Vec<_> = hotels.hotels.iter().filter(|h| h.name.is_some()).collect();
    if offers.is_empty() {
        return None;
    }
    offers.sort_by(|a, b| b.rating.unwrap_or(0.0).total_cmp(&a.rating.unwrap_or(0.0)));

    let mut areas: Vec<String> = offers.iter().filter_map(|h| h.area.clone()).collect();
    areas.dedup();

    let listed: Vec<Value> = offers
        .iter()
        .take(view.max_items)
        .map(|h| {
            json!({
                "name": h.name,
                "pricePerNight": h.price_per_night,
                "currency": h.currency,
                "rating": h.rating,
                "area": h.area,
                "amenities": h.amenities,
            })
        })
        .collect();

    Some(json!({
        "hotels": listed,
        "recommendedAreas": areas,
        "tips": ["Check the cancellation policy before paying"],
    }))
}

fn attractions(view: &SourceView<'_>) -> Option<Value> {
    let guide = view.guide()?;
    let mut places: Vec<_> = guide.attractions.iter().filter(|a| a.name.is_some()).collect();
    if places.is_empty() {
        return None;
    }
    places.sort_by(|a, b| b.rating.unwrap_or(0.0).total_cmp(&a.rating.unwrap_or(0.0)));

    let listed: Vec<Value> = places
        .iter()
        .take(view.max_items)
        .map(|a| {
            json!({
                "name": a.name,
                "category": a.category,
                "description": a.description,
                "rating": a.rating,
                "entryFee": a.entry_fee,
            })
        })
        .collect();
    let must_see: Vec<_> = places.iter().take(3).filter_map(|a| a.name.clone()).collect();
    let hidden: Vec<_> = places.iter().skip(3).filter_map(|a| a.name.clone()).collect();

    Some(json!({
        "attractions": listed,
        "mustSee": must_see,
        "hiddenGems": hidden,
    }))
}

fn food(request: &TravelRequest, view: &SourceView<'_>) -> Option<Value> {
    let guide = view.guide()?;
    if guide.cuisine.is_empty() {
        return None;
    }
    let dishes: Vec<Value> = guide
        .cuisine
        .iter()
        .take(view.max_items)
        .map(|d| json!({ "name": d }))
        .collect();
    let dietary = request
        .dietary
        .as_deref()
        .map_or_else(String::new, |d| format!("Ask for {d} versions of local dishes"));

    Some(json!({
        "dishes": dishes,
        "restaurants": [format!("Local eateries in {}", request.destination.trim())],
        "dietaryNotes": dietary,
    }))
}

fn visa(view: &SourceView<'_>) -> Option<Value> {
    let visa = view.visa()?;
    let required = visa.required?;
    let fee = visa.fee.map(|fee| match &visa.fee_currency {
        Some(currency) => format!("{fee:.0} {currency}"),
        None => format!("{fee:.0}"),
    });

    Some(json!({
        "visaRequired": required,
        "visaType": visa.visa_type,
        "processingTime": visa.processing_time,
        "documents": visa.documents,
        "fee": fee,
        "notes": visa.notes,
    }))
}

fn weather(view: &SourceView<'_>) -> Option<Value> {
    let guide = view.guide()?;
    let climate = guide.climate.clone()?;
    let lowered = climate.to_lowercase();
    let mut packing = vec!["Comfortable walking shoes"];
    if ["tropical", "hot", "humid", "sunny"].iter().any(|w| lowered.contains(w)) {
        packing.extend(["Sunscreen", "Light cotton clothing"]);
    }
    if ["monsoon", "rain", "wet"].iter().any(|w| lowered.contains(w)) {
        packing.push("Compact umbrella");
    }
    if ["cold", "winter", "snow", "alpine"].iter().any(|w| lowered.contains(w)) {
        packing.push("Warm layers");
    }

    Some(json!({
        "climate": climate,
        "bestMonths": guide.best_time_to_visit.iter().collect::<Vec<_>>(),
        "packing": packing,
    }))
}

fn tips(request: &TravelRequest, view: &SourceView<'_>) -> Option<Value> {
    let guide = view.guide()?;
    if guide.local_tips.is_empty() {
        return None;
    }
    let mut tips: Vec<String> = guide.local_tips.iter().take(view.max_items).cloned().collect();
    if let Some(notes) = view.visa().and_then(|v| v.notes.clone()) {
        tips.push(notes);
    }
    if let Some(currency) = view.currency() {
        if let (Some(target), Some(rate)) = (&currency.target, currency.rate) {
            tips.push(format!(
                "Carry some {target}; 1 {} is about {rate:.2} {target}",
                currency.base.as_deref().unwrap_or(lookup::DEFAULT_CURRENCY)
            ));
        }
    }

    Some(json!({
        "tips": tips,
        "etiquette": [format!("Respect local customs in {}", request.destination.trim())],
        "safety": ["Keep valuables out of sight in crowded places"],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BudgetTier, RawSources};
    use crate::providers::StaticRates;
    use crate::quality::SourceQualityAssessor;
    use serde_json::json;

    fn goa() -> TravelRequest {
        TravelRequest::new("Goa", "Mumbai", "5-7", BudgetTier::Comfortable)
    }

    fn validated(values: Vec<(SourceKind, Value)>) -> ValidatedSourceData {
        let raw = RawSources::from_values(values);
        SourceQualityAssessor::default().assess(&raw, &goa())
    }

    fn hotels() -> (SourceKind, Value) {
        (
            SourceKind::Hotels,
            json!({
                "destination": "Goa",
                "hotels": [
                    { "name": "Sea Breeze", "pricePerNight": 60, "currency": "USD", "rating": 4.2, "area": "Calangute" },
                    { "name": "Palm Court", "pricePerNight": 4980, "currency": "INR", "rating": 4.6, "area": "Panaji" }
                ]
            }),
        )
    }

    #[test]
    fn test_accommodation_sorted_by_rating() {
        let sources = validated(vec![hotels()]);
        let view = SourceView::new(&sources, &StaticRates, 5);
        let content = restructure(CardType::Accommodation, &goa(), &view).unwrap();
        assert_eq!(content["hotels"][0]["name"], "Palm Court");
        assert_eq!(content["recommendedAreas"][1], "Calangute");
    }

    #[test]
    fn test_budget_is_local_currency() {
        let sources = validated(vec![hotels()]);
        let view = SourceView::new(&sources, &StaticRates, 5);
        let content = restructure(CardType::Budget, &goa(), &view).unwrap();
        assert_eq!(content["currency"], "INR");
        assert_eq!(content["budget"]["level"], "Comfortable");
        // Both offers average to 4980 INR, 5 nights, one room
        assert_eq!(content["breakdown"]["accommodation"], 24_900.0);
    }

    #[test]
    fn test_nothing_usable_gives_none() {
        let sources = validated(vec![]);
        let view = SourceView::new(&sources, &StaticRates, 5);
        for card_type in CardType::ALL {
            assert!(restructure(card_type, &goa(), &view).is_none(), "{card_type}");
        }
    }

    #[test]
    fn test_visa_without_requirement_flag_gives_none() {
        let sources = validated(vec![(
            SourceKind::Visa,
            json!({ "destination": "Goa", "visaType": "none", "documents": ["ID"] }),
        )]);
        let view = SourceView::new(&sources, &StaticRates, 5);
        assert!(restructure(CardType::Visa, &goa(), &view).is_none());
    }
}
